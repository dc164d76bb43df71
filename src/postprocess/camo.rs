//! Image proxy URLs.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::config::{CamoSettings, MarkupSettings};
use crate::links::is_full_url;

type HmacSha1 = Hmac<Sha1>;

/// Encodes `link` as `<server>/<b64url(hmac-sha1(link))>/<b64url(link)>`.
///
/// Returns `None` when the key cannot be used.
pub fn camo_encode(camo: &CamoSettings, link: &str) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(camo.hmac_key.as_bytes()).ok()?;
    mac.update(link.as_bytes());
    let digest = mac.finalize().into_bytes();

    Some(format!(
        "{}/{}/{}",
        camo.server_url.trim_end_matches('/'),
        URL_SAFE_NO_PAD.encode(digest),
        URL_SAFE_NO_PAD.encode(link)
    ))
}

/// Proxies an image source through camo when configured.
///
/// Sources on the application itself, sources already proxied and (unless
/// `always` is set) HTTPS sources are returned unchanged.
pub fn camo_rewrite(settings: &MarkupSettings, link: &str) -> String {
    let camo = &settings.camo;
    if !camo.enabled || camo.server_url.is_empty() || !is_full_url(link) {
        return link.to_string();
    }
    if link.starts_with(&settings.app_url) || link.starts_with(&camo.server_url) {
        return link.to_string();
    }
    let secure = link
        .get(..8)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"));
    if secure && !camo.always {
        return link.to_string();
    }

    camo_encode(camo, link).unwrap_or_else(|| link.to_string())
}
