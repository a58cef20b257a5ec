/// Identifier and URL helpers shared by the extractors
use url::Url;

/// Derive the canonical short ID from a URL or path: its last non-empty segment.
///
/// `https://anime-world.co/series/naruto/` → `naruto`. Empty input yields an empty ID.
pub fn extract_id_from_url(url: &str) -> String {
    url.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}

/// True for `http://` and `https://` URLs
pub fn is_absolute_http(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True when `url` is absolute and served from a different host than `base_url`
pub fn is_external(url: &str, base_url: &str) -> bool {
    if !is_absolute_http(url) {
        return false;
    }

    match (Url::parse(url), Url::parse(base_url)) {
        (Ok(target), Ok(origin)) => target.host_str() != origin.host_str(),
        // Unparseable absolute URL: fall back to a textual check
        _ => !url.contains(base_url),
    }
}

/// Resolve an origin-relative reference against `base_url`; absolute URLs pass through
pub fn absolutize(base_url: &str, reference: &str) -> String {
    if reference.is_empty() || is_absolute_http(reference) {
        return reference.to_string();
    }

    match Url::parse(base_url).and_then(|base| base.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => reference.to_string(),
    }
}
