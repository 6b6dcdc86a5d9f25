//! Protocol headers: `Category` tag headers and HTTP dates.
//!
//! A `Category` header carries tags as a comma separated list of
//! `term; scheme="..."; label="..."` items.

use chrono::{DateTime, Utc};
use helios_client_model::{FHIR_TAG_SCHEME_GENERAL, Tag};
use http::HeaderValue;
use http::header::{HeaderMap, HeaderName, InvalidHeaderValue};

/// The tag header.
pub static CATEGORY: HeaderName = HeaderName::from_static("category");

/// Renders tags as a `Category` header value.
pub fn format_category(tags: &[Tag]) -> Result<HeaderValue, InvalidHeaderValue> {
    let items: Vec<String> = tags
        .iter()
        .map(|tag| {
            let mut item = format!("{}; scheme=\"{}\"", term(&tag.term), quote(&tag.scheme));
            if let Some(label) = &tag.label {
                item.push_str(&format!("; label=\"{}\"", quote(label)));
            }
            item
        })
        .collect();
    HeaderValue::from_str(&items.join(", "))
}

/// Reads every `Category` header of a message.
///
/// Items without a term are skipped. A missing scheme means the general tag
/// scheme.
pub fn parse_category(headers: &HeaderMap) -> Vec<Tag> {
    headers
        .get_all(&CATEGORY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_category_value)
        .collect()
}

/// Parses one `Category` header value.
pub fn parse_category_value(value: &str) -> Vec<Tag> {
    split_outside_quotes(value, ',')
        .into_iter()
        .filter_map(|item| {
            let mut parts = split_outside_quotes(&item, ';').into_iter();
            let term = unquote(parts.next()?.trim());
            if term.is_empty() {
                return None;
            }
            let mut scheme = None;
            let mut label = None;
            for part in parts {
                let Some((name, value)) = part.split_once('=') else {
                    continue;
                };
                let value = unquote(value.trim());
                match name.trim().to_ascii_lowercase().as_str() {
                    "scheme" => scheme = Some(value),
                    "label" => label = Some(value),
                    _ => {}
                }
            }
            Some(Tag {
                term,
                scheme: scheme.unwrap_or_else(|| FHIR_TAG_SCHEME_GENERAL.to_string()),
                label,
            })
        })
        .collect()
}

fn split_outside_quotes(value: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            c if c == separator && !quoted => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// A term is written bare unless it holds a separator, quote or backslash.
fn term(value: &str) -> String {
    if value.contains([',', ';', '"', '\\']) {
        format!("\"{}\"", quote(value))
    } else {
        value.to_string()
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders an HTTP date (`Sun, 17 Aug 2014 10:00:00 GMT`).
pub fn format_http_date(when: &DateTime<Utc>) -> String {
    when.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an HTTP date.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
