//! Link resolution for rendered markup.
//!
//! Render helpers map a logical [`LinkType`] to a base path and delegate to
//! [`LinkResolver`] for the actual joining. Intermediate links may carry
//! their type inline as a `/:<type><link>` token.

use crate::config::MarkupSettings;

/// Logical destination of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Relative to the application sub URL
    Root,
    /// Media files (images, videos), served with a media content type
    Media,
    /// Raw file content
    Raw,
    /// The helper's default base: a tree path, wiki page or document base
    Default,
}

impl LinkType {
    /// Type name used in `/:<type>` tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Media => "media",
            Self::Raw => "raw",
            Self::Default => "",
        }
    }

    /// Encodes `link` as an intermediate token carrying this type.
    pub fn token(&self, link: &str) -> String {
        match self {
            Self::Default if !link.starts_with('/') && !link.starts_with('.') => {
                format!("/:./{}", link)
            }
            _ if link.starts_with('/') => format!("/:{}{}", self.as_str(), link),
            _ => format!("/:{}/{}", self.as_str(), link),
        }
    }
}

/// Splits an optional `/:<type>` token off `s`.
///
/// Strings without the `/:` prefix resolve as `preferred`. A malformed
/// token is reported in debug builds and also resolves as `preferred`,
/// keeping the raw string so it joins under the base as an inert path.
pub fn parse_rendered_link(s: &str, preferred: LinkType) -> (LinkType, &str) {
    let Some(rest) = s.strip_prefix("/:") else {
        return (preferred, s);
    };

    for link_type in [LinkType::Root, LinkType::Media, LinkType::Raw] {
        if let Some(link) = rest.strip_prefix(link_type.as_str())
            && link.starts_with('/')
        {
            return (link_type, link);
        }
    }

    if rest.starts_with('/') || rest.starts_with('.') {
        return (LinkType::Default, rest);
    }

    if cfg!(debug_assertions) {
        tracing::error!(link = s, "Malformed link type token");
    }
    (preferred, s)
}

/// Whether `link` is a complete URL that must never be rewritten.
pub fn is_full_url(link: &str) -> bool {
    if link.starts_with("mailto:") {
        return true;
    }
    match link.find("://") {
        Some(pos) if pos > 0 => link[..pos]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')),
        _ => false,
    }
}

/// Joins path elements onto `base`, resolving `.` and `..` segments.
///
/// `..` never climbs above `base`. Query and fragment suffixes of the
/// joined elements are preserved.
pub fn url_join(base: &str, elems: &[&str]) -> String {
    let joined = elems.join("/");
    let split = joined.find(['?', '#']).unwrap_or(joined.len());
    let (path, suffix) = joined.split_at(split);

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let rooted = base.starts_with('/');
    let base = base.trim_end_matches('/');
    let mut result = String::with_capacity(base.len() + path.len() + suffix.len() + 1);
    result.push_str(base);
    for segment in segments {
        if !result.is_empty() || rooted {
            result.push('/');
        }
        result.push_str(segment);
    }
    if result.is_empty() && !suffix.is_empty() {
        // Fragment-only link stays relative to the current page
        return suffix.to_string();
    }
    result.push_str(suffix);
    result
}

/// Scheme and authority of a URL, without path.
fn origin_of(url: &str) -> &str {
    match url.find("://") {
        Some(pos) => {
            let authority_start = pos + 3;
            match url[authority_start..].find('/') {
                Some(end) => &url[..authority_start + end],
                None => url,
            }
        }
        None => url.trim_end_matches('/'),
    }
}

/// Rewrites a site-relative link to a fully qualified URL.
pub fn make_absolute_url(host_url: &str, link: &str) -> String {
    if is_full_url(link) {
        return link.to_string();
    }
    let origin = origin_of(host_url);
    if link.starts_with('/') {
        format!("{}{}", origin, link)
    } else {
        format!("{}/{}", host_url.trim_end_matches('/'), link)
    }
}

/// Resolves links against a base using the settings of one render.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    app_sub_url: String,
    host_url: String,
    absolute: bool,
}

impl LinkResolver {
    /// Creates a resolver.
    ///
    /// # Arguments
    ///
    /// * `settings`: Application settings providing sub URL and fallback host
    /// * `host_url`: Host derived from the current request, if any
    /// * `absolute`: Whether resolved links are rewritten to full URLs
    pub fn new(settings: &MarkupSettings, host_url: Option<&str>, absolute: bool) -> Self {
        Self {
            app_sub_url: settings.app_sub_url.clone(),
            host_url: host_url.unwrap_or(&settings.app_url).to_string(),
            absolute,
        }
    }

    /// Application sub URL, empty when mounted at the root.
    pub fn app_sub_url(&self) -> &str {
        &self.app_sub_url
    }

    /// Resolves `link` relative to `base` and the current directory `cur`.
    ///
    /// Handles different link shapes:
    /// - Full URLs (`https://`, `mailto:`) remain byte-identical
    /// - Site-absolute links already under a deep `base` pass through
    ///   (links written against older absolute layouts)
    /// - Other `/`-prefixed links join directly under `base`
    /// - Relative links join under `base/cur`
    pub fn resolve_relative(&self, base: &str, cur: &str, link: &str) -> String {
        if is_full_url(link) {
            return link.to_string();
        }

        let joined = if link.starts_with('/') {
            if link.starts_with(base) && base.matches('/').count() >= 4 {
                link.to_string()
            } else {
                url_join(base, &[".", link])
            }
        } else {
            url_join(base, &[".", cur, link])
        };

        let trimmed = if joined.len() > 1 {
            joined.trim_end_matches('/')
        } else {
            joined.as_str()
        };

        self.finish(trimmed)
    }

    /// Resolves `link` relative to the application root.
    pub fn resolve_root(&self, link: &str) -> String {
        if is_full_url(link) {
            return link.to_string();
        }
        let base = if self.app_sub_url.is_empty() {
            "/"
        } else {
            self.app_sub_url.as_str()
        };
        let joined = url_join(base, &[link]);
        self.finish(if joined.is_empty() { "/" } else { &joined })
    }

    fn finish(&self, link: &str) -> String {
        if self.absolute {
            make_absolute_url(&self.host_url, link)
        } else {
            link.to_string()
        }
    }
}
