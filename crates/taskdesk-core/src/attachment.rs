/// Attachment links are stored as typed by the user, often without a scheme.
/// Anything not already starting with `http://` or `https://` (any case)
/// gets `https://` prepended. Surrounding whitespace is dropped first.
pub fn normalize_link(link: &str) -> String {
    let trimmed = link.trim();
    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn has_http_scheme(link: &str) -> bool {
    let lower = link
        .get(..8)
        .unwrap_or(link)
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
