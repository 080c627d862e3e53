const DEFAULT_SCHEME_PREFIX: &str = "http://";

/// Turn user input into an absolute URL string.
///
/// Input without an `http://` or `https://` prefix gets `http://` prepended.
/// Nothing is checked beyond that; unreachable or unparsable targets surface
/// when the page is fetched.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if has_prefix_ignore_case(trimmed, "http://") || has_prefix_ignore_case(trimmed, "https://") {
        return trimmed.to_string();
    }
    // Protocol-relative input already carries the `//` authority marker.
    let rest = trimmed.strip_prefix("//").unwrap_or(trimmed);
    format!("{DEFAULT_SCHEME_PREFIX}{rest}")
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
