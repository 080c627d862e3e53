//! Point page references at their local copies.
//!
//! The page is rewritten at the tag level: only the values of the rewritten
//! attributes change, everything else (comments, doctype, script bodies,
//! whitespace) is copied byte-for-byte.

use std::borrow::Cow;
use std::fs;
use std::ops::Range;
use std::path::Path;

use cloner_core::local_path;
use scraper::{ElementRef, Html};
use url::Url;

use crate::css;
use crate::extract::{document_base, has_static_extension, resolve_reference, REFERENCE_ATTRIBUTES};
use crate::workspace::{AtomicFileWriter, PersistError};

/// Elements whose content is raw text; tags inside them are not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "noscript", "iframe", "xmp", "noembed", "noframes",
];

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("page path {0} has no file name")]
    InvalidPath(String),
}

/// Rewrite the saved page at `page_path` in place.
pub fn rewrite_page(page_path: &Path, page_url: &Url) -> Result<(), RewriteError> {
    let html = fs::read_to_string(page_path)?;
    let rewritten = rewrite_html(&html, page_url);

    let dir = page_path
        .parent()
        .ok_or_else(|| RewriteError::InvalidPath(page_path.display().to_string()))?;
    let filename = page_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RewriteError::InvalidPath(page_path.display().to_string()))?;
    AtomicFileWriter::new(dir.to_path_buf()).write(filename, rewritten.as_bytes())?;
    Ok(())
}

/// Replace every asset reference in `html` with its workspace-relative path.
///
/// References that cannot be fetched (`data:`, fragments, empty values) are
/// left alone. `<base>` elements are dropped, since they would send the
/// local paths back to the remote site; the first one still sets the base
/// for the whole document.
pub fn rewrite_html(html: &str, page_url: &Url) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let base = document_base(&Html::parse_document(html), page_url);
    let mut pos = 0;

    while let Some(offset) = html[pos..].find('<') {
        let start = pos + offset;
        out.push_str(&html[pos..start]);
        let rest = &html[start..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(html.len(), |i| start + i + 3);
            out.push_str(&html[start..end]);
            pos = end;
            continue;
        }
        if rest.starts_with("</") || rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map_or(html.len(), |i| start + i + 1);
            out.push_str(&html[start..end]);
            pos = end;
            continue;
        }

        let Some(tag) = parse_start_tag(rest) else {
            out.push('<');
            pos = start + 1;
            continue;
        };
        let tag_text = &rest[..tag.len];
        pos = start + tag.len;

        if tag.name == "base" {
            continue;
        }

        out.push_str(&rewrite_tag(tag_text, &tag, &base));

        // `/>` does not end a raw-text element.
        if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            let body_end = find_closing_tag(&html[pos..], &tag.name).map_or(html.len(), |i| pos + i);
            let body = &html[pos..body_end];
            if tag.name == "style" {
                out.push_str(&rewrite_css_text(body, &base));
            } else {
                out.push_str(body);
            }
            pos = body_end;
        }
    }
    out.push_str(&html[pos..]);
    out
}

/// Rewrite `url(...)`/`@import` targets of inline CSS against `base`.
pub fn rewrite_css_text(css_text: &str, base: &Url) -> String {
    css::rewrite_references(css_text, |raw| map_reference(raw, base))
}

fn map_reference(raw: &str, base: &Url) -> Option<String> {
    resolve_reference(raw, base).map(|url| local_path(&url))
}

fn rewrite_tag(tag_text: &str, tag: &StartTag<'_>, base: &Url) -> String {
    let mut replacements: Vec<(Range<usize>, String)> = Vec::new();
    let parsed = tag
        .attrs
        .iter()
        .any(|attr| attr.value.contains('&'))
        .then(|| parsed_attributes(tag_text, tag.name.len()));

    for attr in &tag.attrs {
        let value: Cow<'_, str> = match &parsed {
            Some(parsed) if attr.value.contains('&') => parsed
                .iter()
                .find(|(name, _)| *name == attr.name)
                .map_or(Cow::Borrowed(attr.value), |(_, value)| Cow::Owned(value.clone())),
            _ => Cow::Borrowed(attr.value),
        };
        let is_reference = REFERENCE_ATTRIBUTES
            .iter()
            .any(|(t, a)| *t == tag.name && *a == attr.name)
            || (tag.name == "a"
                && attr.name == "href"
                && resolve_reference(&value, base).is_some_and(|url| has_static_extension(&url)));

        let new_value = if is_reference {
            map_reference(&value, base)
        } else if attr.name == "srcset" {
            Some(rewrite_srcset(&value, base))
        } else if attr.name == "style" {
            Some(rewrite_css_text(&value, base))
        } else {
            None
        };

        if let Some(new_value) = new_value.filter(|v| *v != value) {
            replacements.push((attr.raw_range.clone(), format!("\"{}\"", escape_attr(&new_value))));
        }
    }

    if replacements.is_empty() {
        return tag_text.to_string();
    }
    let mut rewritten = String::with_capacity(tag_text.len() + 32);
    let mut cursor = 0;
    for (range, replacement) in replacements {
        rewritten.push_str(&tag_text[cursor..range.start]);
        rewritten.push_str(&replacement);
        cursor = range.end;
    }
    rewritten.push_str(&tag_text[cursor..]);
    rewritten
}

fn rewrite_srcset(srcset: &str, base: &Url) -> String {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (reference, descriptor) = candidate
                .split_once(char::is_whitespace)
                .map_or((candidate, ""), |(r, d)| (r, d.trim()));
            let mapped = map_reference(reference, base).unwrap_or_else(|| reference.to_string());
            if descriptor.is_empty() {
                mapped
            } else {
                format!("{mapped} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

struct Attribute<'a> {
    name: String,
    value: &'a str,
    /// Range of the value in the tag text, including quotes.
    raw_range: Range<usize>,
}

struct StartTag<'a> {
    name: String,
    attrs: Vec<Attribute<'a>>,
    len: usize,
}

/// Parse a start tag at the beginning of `input` (which starts with `<`).
/// Returns `None` for text that only looks like a tag.
fn parse_start_tag(input: &str) -> Option<StartTag<'_>> {
    let bytes = input.as_bytes();
    if bytes.len() < 2 || !bytes[1].is_ascii_alphabetic() {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() && !is_tag_delimiter(bytes[i]) {
        i += 1;
    }
    let name = input[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        if bytes[i] == b'>' {
            return Some(StartTag {
                name,
                attrs,
                len: i + 1,
            });
        }

        let name_start = i;
        while i < bytes.len() && !is_tag_delimiter(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        // A stray `=` where a name should start is consumed as a name.
        if i == name_start {
            i += 1;
        }
        let attr_name = input[name_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            attrs.push(Attribute {
                name: attr_name,
                value: "",
                raw_range: i..i,
            });
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() {
            return None;
        }

        let (value, raw_range) = match bytes[j] {
            quote @ (b'"' | b'\'') => {
                let close = input[j + 1..].find(quote as char)? + j + 1;
                (&input[j + 1..close], j..close + 1)
            }
            _ => {
                let mut k = j;
                while k < bytes.len() && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                (&input[j..k], j..k)
            }
        };
        i = raw_range.end;
        attrs.push(Attribute {
            name: attr_name,
            value,
            raw_range,
        });
    }
}

fn is_tag_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'/' || byte == b'>'
}

/// Byte offset of `</name` (case-insensitive) in `text`.
fn find_closing_tag(text: &str, name: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let needle_len = name.len() + 2;
    let mut from = 0;
    while let Some(offset) = text[from..].find("</") {
        let at = from + offset;
        let candidate = bytes.get(at + 2..at + needle_len)?;
        let terminated = bytes
            .get(at + needle_len)
            .map_or(true, |b| is_tag_delimiter(*b));
        if candidate.eq_ignore_ascii_case(name.as_bytes()) && terminated {
            return Some(at);
        }
        from = at + 2;
    }
    None
}

/// Attribute values of the tag as the HTML parser decodes them. The tag is
/// re-parsed as a `<span>` so any element name works in a fragment context.
fn parsed_attributes(tag_text: &str, name_len: usize) -> Vec<(String, String)> {
    let neutral = format!("<span{}", &tag_text[1 + name_len..]);
    let fragment = Html::parse_fragment(&neutral);
    fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "span")
        .map(|span| {
            span.value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
