//! `url(...)` and `@import` handling shared by discovery and rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static URL_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)url\(\s*([^)]*?)\s*\)").expect("valid url() pattern"));

// Alternatives: url(...), "...", '...', bare token.
static IMPORT_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\(\s*([^)]*?)\s*\)|"([^"]*)"|'([^']*)'|([^\s"'();]+))"#)
        .expect("valid @import pattern")
});

// Quoted @import targets or any url(...); a url() after @import is covered
// by the second alternative, so nothing is rewritten twice.
static REWRITABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')|url\(\s*([^)]*?)\s*\)"#)
        .expect("valid rewrite pattern")
});

/// Raw targets of every `url(...)` in `css`, quotes removed.
pub(crate) fn url_references(css: &str) -> Vec<&str> {
    URL_FUNCTION
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| strip_quotes(m.as_str()))
        .filter(|target| !target.is_empty())
        .collect()
}

/// Raw targets of every `@import`, with or without `url()` and quotes.
pub(crate) fn import_references(css: &str) -> Vec<&str> {
    IMPORT_RULE
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if let Some(bare) = caps.get(4) {
                // `@import url (x)` or an unknown function: not a target.
                if css[whole.end()..].trim_start().starts_with('(') {
                    return None;
                }
                return Some(bare.as_str());
            }
            (1..=3).find_map(|i| caps.get(i)).map(|m| strip_quotes(m.as_str()))
        })
        .filter(|target| !target.is_empty())
        .collect()
}

/// Replace `url(...)` and quoted `@import` targets for which `map` returns a
/// new value. Everything else is copied unchanged.
pub(crate) fn rewrite_references<F>(css: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    REWRITABLE
        .replace_all(css, |caps: &Captures<'_>| {
            let original = caps[0].to_string();
            if let Some(target) = caps.get(1).or_else(|| caps.get(2)) {
                return match map(target.as_str()) {
                    Some(local) => format!("@import \"{local}\""),
                    None => original,
                };
            }
            let target = caps.get(3).map_or("", |m| strip_quotes(m.as_str()));
            if target.is_empty() {
                return original;
            }
            match map(target) {
                Some(local) => format!("url('{local}')"),
                None => original,
            }
        })
        .into_owned()
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(['"', '\'']).trim()
}
