//! Resolution of the relative `links` embedded in registry payloads.

use serde_json::Value;
use url::Url;

/// Looks up `key` in a payload's `links` map and joins it onto `base_url`.
///
/// Returns `None` when the map is absent, the key is absent, null or blank, or the
/// link cannot be joined. `None` means "this sub-resource does not exist here":
/// callers skip it and do not fail.
pub fn resolve(base_url: &Url, links: Option<&Value>, key: &str) -> Option<Url> {
    let link = links?.get(key)?.as_str()?;
    resolve_raw(base_url, link)
}

/// Resolves a raw link string (already pulled out of a payload) onto `base_url`.
pub fn resolve_raw(base_url: &Url, link: &str) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }

    match base_url.join(link) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Ignoring malformed link '{}': {}", link, e);
            None
        }
    }
}
