//! Helpers shared by the JSON and XML codecs.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use helios_client_model::{
    BundleLinks, Element, ElementShape, Field, PrimitiveKind, PrimitiveValue, ResourceIdentity,
};
use rust_decimal::Decimal;

use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;

/// FHIR namespace URI, declared on resource and tag list roots.
pub const FHIR_NAMESPACE: &str = "http://hl7.org/fhir";

/// Atom namespace URI, declared on feed roots.
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Atom tombstones namespace (`at:deleted-entry`).
pub const TOMBSTONE_NAMESPACE: &str = "http://purl.org/atompub/tombstones/1.0";

/// OpenSearch namespace (`os:totalResults`).
pub const OPENSEARCH_NAMESPACE: &str = "http://a9.com/-/spec/opensearch/1.1/";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Drops a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(payload: &[u8]) -> &[u8] {
    payload.strip_prefix(UTF8_BOM).unwrap_or(payload)
}

/// Elements written before all others when a shape does not place them.
const LEADING_ELEMENTS: [&str; 4] = ["extension", "modifierExtension", "text", "contained"];

/// Fields of `element` in write order: leading implicit elements, then
/// declared elements in shape order, then the rest by name.
pub(crate) fn ordered_fields<'a>(
    element: &'a Element,
    shapes: &[ElementShape],
) -> Vec<(&'a str, &'a Field)> {
    let mut fields: Vec<_> = element.iter().collect();
    fields.sort_by_key(|(name, _)| {
        if let Some(position) = shapes.iter().position(|s| s.name == *name) {
            (1, position)
        } else if let Some(position) = LEADING_ELEMENTS.iter().position(|l| l == name) {
            (0, position)
        } else {
            (2, 0)
        }
    });
    fields
}

/// Children of the implicit `extension` element.
pub(crate) fn extension_children() -> &'static [ElementShape] {
    helios_client_model::shape::find_element(&[], "extension")
        .map(ElementShape::children)
        .unwrap_or(&[])
}

/// Parses the lexical form of a primitive.
pub(crate) fn parse_lexical(
    kind: PrimitiveKind,
    lexical: &str,
) -> std::result::Result<PrimitiveValue, String> {
    match kind {
        PrimitiveKind::Boolean => match lexical {
            "true" => Ok(PrimitiveValue::Boolean(true)),
            "false" => Ok(PrimitiveValue::Boolean(false)),
            other => Err(format!("'{}' is not a boolean", other)),
        },
        PrimitiveKind::Integer => lexical
            .trim()
            .parse::<i64>()
            .map(PrimitiveValue::Integer)
            .map_err(|_| format!("'{}' is not an integer", lexical)),
        PrimitiveKind::Decimal => parse_decimal(lexical)
            .map(PrimitiveValue::Decimal)
            .ok_or_else(|| format!("'{}' is not a decimal", lexical)),
        PrimitiveKind::String => Ok(PrimitiveValue::String(lexical.to_string())),
    }
}

pub(crate) fn parse_decimal(lexical: &str) -> Option<Decimal> {
    let lexical = lexical.trim();
    Decimal::from_str(lexical)
        .or_else(|_| Decimal::from_scientific(lexical))
        .ok()
}

pub(crate) fn parse_timestamp(format: ResourceFormat, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SerdeError::malformed(format, format!("invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Navigation links must be absolute urls; other relations are not checked.
pub(crate) fn check_nav_link(format: ResourceFormat, rel: &str, href: &str) -> Result<()> {
    if !BundleLinks::is_navigation(rel) {
        return Ok(());
    }
    match url::Url::parse(href) {
        Ok(_) => Ok(()),
        Err(e) => Err(SerdeError::malformed(
            format,
            format!("'{}' link '{}' is not an absolute url: {}", rel, href, e),
        )),
    }
}

pub(crate) fn parse_identity(format: ResourceFormat, value: &str) -> Result<ResourceIdentity> {
    ResourceIdentity::parse(value.trim()).map_err(|e| {
        SerdeError::malformed(format, format!("invalid entry identity '{}': {}", value, e))
    })
}

/// Normalizes an entry's identities: the id is unversioned, and a versioned id
/// without a self link becomes the self link.
pub(crate) fn entry_identities(
    id: ResourceIdentity,
    self_link: Option<ResourceIdentity>,
) -> (ResourceIdentity, Option<ResourceIdentity>) {
    if id.is_versioned() {
        let self_link = self_link.or_else(|| Some(id.clone()));
        (id.without_version(), self_link)
    } else {
        (id, self_link)
    }
}
