use std::collections::BTreeSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::css;

/// `(element, attribute)` pairs whose value is a single asset reference.
pub(crate) const REFERENCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("img", "src"),
    ("script", "src"),
    ("link", "href"),
    ("source", "src"),
    ("video", "src"),
    ("video", "poster"),
    ("audio", "src"),
    ("track", "src"),
    ("embed", "src"),
];

/// Extensions that make an anchor target a static resource rather than a page.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "woff", "woff2", "ttf",
    "otf", "eot", "mp4", "webm", "mp3", "ogg", "ico",
];

/// Every asset referenced by `html`, resolved against `page_url` (or the
/// document's `<base href>`). The page itself is never part of the result.
pub fn extract_assets(page_url: &Url, html: &str) -> BTreeSet<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);
    let mut assets = BTreeSet::new();

    for node in document.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let tag = element.value().name();

        for (_, attr) in REFERENCE_ATTRIBUTES.iter().filter(|(t, _)| *t == tag) {
            if let Some(url) = element
                .value()
                .attr(attr)
                .and_then(|raw| resolve_reference(raw, &base))
            {
                assets.insert(url);
            }
        }

        if let Some(srcset) = element.value().attr("srcset") {
            assets.extend(
                srcset_candidates(srcset)
                    .filter_map(|candidate| resolve_reference(candidate, &base)),
            );
        }

        if let Some(style) = element.value().attr("style") {
            assets.extend(
                css::url_references(style)
                    .into_iter()
                    .filter_map(|raw| resolve_reference(raw, &base)),
            );
        }

        match tag {
            "style" => {
                let text = element.text().collect::<String>();
                assets.extend(extract_css(&base, &text));
            }
            "a" => {
                if let Some(url) = element
                    .value()
                    .attr("href")
                    .and_then(|raw| resolve_reference(raw, &base))
                    .filter(has_static_extension)
                {
                    assets.insert(url);
                }
            }
            _ => {}
        }
    }

    assets.remove(&without_fragment(page_url));
    assets
}

/// `url(...)` references and `@import` targets of a stylesheet, resolved
/// against the stylesheet's own URL.
pub fn extract_css(base_url: &Url, css_text: &str) -> BTreeSet<Url> {
    css::url_references(css_text)
        .into_iter()
        .chain(css::import_references(css_text))
        .filter_map(|raw| resolve_reference(raw, base_url))
        .collect()
}

/// Only the `@import` targets of a stylesheet.
pub fn css_imports(base_url: &Url, css_text: &str) -> Vec<Url> {
    let mut seen = BTreeSet::new();
    css::import_references(css_text)
        .into_iter()
        .filter_map(|raw| resolve_reference(raw, base_url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// `<link rel="stylesheet">` targets in document order.
pub fn stylesheet_links(page_url: &Url, html: &str) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);
    let Some(selector) = Selector::parse("link[rel][href]").ok() else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for link in document.select(&selector) {
        let is_stylesheet = link.value().attr("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        });
        if !is_stylesheet {
            continue;
        }
        if let Some(url) = link
            .value()
            .attr("href")
            .and_then(|raw| resolve_reference(raw, &base))
        {
            if !links.contains(&url) {
                links.push(url);
            }
        }
    }
    links
}

/// Resolve a raw reference into a fetchable asset URL.
///
/// Empty and fragment-only references and anything that is not http(s)
/// (`data:`, `javascript:`, `mailto:`) yield `None`.
pub(crate) fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let url = base.join(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(without_fragment(&url))
}

pub(crate) fn srcset_candidates(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

pub(crate) fn has_static_extension(url: &Url) -> bool {
    let last_segment = url.path().rsplit('/').next().unwrap_or_default();
    last_segment
        .rsplit_once('.')
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// The first `<base href>` of the document resolved against `page_url`.
pub(crate) fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}
