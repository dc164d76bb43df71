//! Content sniffing for renderer detection.
//!
//! Classification runs in three phases:
//! 1. Image magic bytes (PNG, JPEG, GIF, WebP, SVG root element)
//! 2. NUL byte heuristic (git's binary detection approach)
//! 3. UTF-8 validation, tolerating a multi-byte character cut off by the
//!    end of a prefetch buffer

/// Maximum bytes to check for NUL byte heuristic (git uses 8KB).
const BINARY_CHECK_LEN: usize = 8192;

/// Coarse content type of a file prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedType {
    /// Plain text, valid UTF-8
    Text,
    /// Raster or vector image
    Image,
    /// Anything else
    Binary,
}

impl SniffedType {
    /// Whether the content is plain text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// Sniffs the content type of a (possibly truncated) file prefix.
///
/// # Examples
///
/// ```
/// use gitkyl_markup::{SniffedType, sniff};
///
/// assert_eq!(sniff(b"Hello, world!"), SniffedType::Text);
/// assert_eq!(sniff(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]), SniffedType::Image);
/// assert_eq!(sniff(b"\x00\x01\x02"), SniffedType::Binary);
/// ```
pub fn sniff(bytes: &[u8]) -> SniffedType {
    if is_image(bytes) {
        return SniffedType::Image;
    }

    let check_len = bytes.len().min(BINARY_CHECK_LEN);
    if bytes[..check_len].contains(&0) {
        return SniffedType::Binary;
    }

    match std::str::from_utf8(bytes) {
        Ok(_) => SniffedType::Text,
        // error_len() is None when the input ends inside a character
        Err(e) if e.error_len().is_none() => SniffedType::Text,
        Err(_) => SniffedType::Binary,
    }
}

fn is_image(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || (bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP")
        || is_svg_root_element(bytes)
}

/// Checks if content has SVG as root element.
///
/// `<svg` must be the root element after an optional XML declaration and
/// DOCTYPE, not just appear anywhere in the content.
fn is_svg_root_element(bytes: &[u8]) -> bool {
    let check_len = bytes.len().min(1024);
    let Ok(text) = std::str::from_utf8(&bytes[..check_len]) else {
        return false;
    };

    let mut content = text.trim_start();

    if let Some(rest) = content.strip_prefix("<?xml") {
        let Some(end) = rest.find("?>") else {
            return false;
        };
        content = rest[end + 2..].trim_start();
    }

    if let Some(rest) = content.strip_prefix("<!DOCTYPE") {
        let Some(end) = rest.find('>') else {
            return false;
        };
        content = rest[end + 1..].trim_start();
    }

    content.starts_with("<svg")
}
