use url::Url;

/// File name used for directory-like URL paths (`/`, `/docs/`).
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Maximum length of the query-string fingerprint appended to a mapped path.
///
/// Distinct queries that agree on their first characters still collide; the
/// fingerprint only keeps common cache-busting variants apart.
pub const QUERY_FINGERPRINT_LEN: usize = 40;

/// Deterministic workspace-relative path for a remote URL.
///
/// The result is `/`-separated, starts with the host (port appended with `_`)
/// and never contains `.`/`..` segments, so it always stays inside the
/// workspace. The fragment is ignored.
pub fn local_path(url: &Url) -> String {
    let mut path = host_prefix(url);

    let raw_path = url.path();
    let directory_like = raw_path.is_empty() || raw_path.ends_with('/');
    let mut pushed = false;
    for segment in raw_path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push('/');
        path.push_str(&sanitize_segment(segment));
        pushed = true;
    }
    if directory_like || !pushed {
        path.push('/');
        path.push_str(DEFAULT_DOCUMENT);
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        path.push('_');
        path.extend(
            query
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .take(QUERY_FINGERPRINT_LEN),
        );
    }
    path
}

fn host_prefix(url: &Url) -> String {
    let host = url.host_str().unwrap_or("_");
    let host = match url.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    };
    sanitize_segment(&host)
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect()
}

// `%` is included so a percent-encoded name on disk is referenced by the same
// literal text in the rewritten page; browsers would decode it otherwise.
fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' | '\0'..='\u{1F}'
    )
}
