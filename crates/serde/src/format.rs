//! Wire formats and their media types.

use std::fmt;
use std::str::FromStr;

/// The two wire representations of the resource model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceFormat {
    /// XML markup (application/xml+fhir, Atom feeds)
    #[default]
    Xml,
    /// JSON structured text (application/json+fhir)
    Json,
}

/// MIME type of an XML resource or tag list.
pub const XML_MIME_TYPE: &str = "application/xml+fhir";
/// MIME type of a JSON resource, bundle or tag list.
pub const JSON_MIME_TYPE: &str = "application/json+fhir";
/// MIME type of an XML feed.
pub const ATOM_MIME_TYPE: &str = "application/atom+xml";

impl ResourceFormat {
    /// Returns the MIME type used for single resources in this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResourceFormat::Xml => XML_MIME_TYPE,
            ResourceFormat::Json => JSON_MIME_TYPE,
        }
    }

    /// Returns the MIME type used for feeds in this format.
    pub fn feed_mime_type(&self) -> &'static str {
        match self {
            ResourceFormat::Xml => ATOM_MIME_TYPE,
            ResourceFormat::Json => JSON_MIME_TYPE,
        }
    }

    /// Value of the `_format` query parameter selecting this format.
    pub fn format_param(&self) -> &'static str {
        match self {
            ResourceFormat::Xml => "xml",
            ResourceFormat::Json => "json",
        }
    }

    /// Parses a `Content-Type` or `Accept` media type.
    ///
    /// Parameters such as `charset` are ignored. Any `application/*` or
    /// `text/*` type whose subtype or suffix is `xml` or `json` is accepted,
    /// which covers `application/xml+fhir`, `application/fhir+json`,
    /// `application/atom+xml` and `text/xml`.
    pub fn parse(media_type: &str) -> Option<Self> {
        let parsed: mime::Mime = media_type.trim().parse().ok()?;
        if parsed.type_() != mime::APPLICATION && parsed.type_() != mime::TEXT {
            return None;
        }
        let mut tokens = std::iter::once(parsed.subtype().as_str())
            .chain(parsed.suffix().map(|s| s.as_str()));
        tokens.find_map(|token| match token.to_ascii_lowercase().as_str() {
            "json" => Some(ResourceFormat::Json),
            "xml" => Some(ResourceFormat::Xml),
            _ => None,
        })
    }

    /// Parses a `_format` parameter value: `xml`, `json` or a media type.
    pub fn from_format_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "xml" => Some(ResourceFormat::Xml),
            "json" => Some(ResourceFormat::Json),
            other => Self::parse(other),
        }
    }
}

impl fmt::Display for ResourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceFormat::Xml => write!(f, "XML"),
            ResourceFormat::Json => write!(f, "JSON"),
        }
    }
}

impl FromStr for ResourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_format_param(s)
            .ok_or_else(|| format!("unknown resource format '{}', expected xml or json", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_types() {
        assert_eq!(
            ResourceFormat::parse("application/xml+fhir"),
            Some(ResourceFormat::Xml)
        );
        assert_eq!(
            ResourceFormat::parse("application/json+fhir; charset=UTF-8"),
            Some(ResourceFormat::Json)
        );
        assert_eq!(
            ResourceFormat::parse("application/atom+xml"),
            Some(ResourceFormat::Xml)
        );
        assert_eq!(
            ResourceFormat::parse("application/fhir+json"),
            Some(ResourceFormat::Json)
        );
        assert_eq!(ResourceFormat::parse("text/xml"), Some(ResourceFormat::Xml));
        assert_eq!(
            ResourceFormat::parse("application/json"),
            Some(ResourceFormat::Json)
        );
        assert_eq!(ResourceFormat::parse("text/html"), None);
        assert_eq!(ResourceFormat::parse("image/svg+xml"), None);
        assert_eq!(ResourceFormat::parse("not a type"), None);
    }

    #[test]
    fn test_format_param() {
        assert_eq!(
            ResourceFormat::from_format_param("JSON"),
            Some(ResourceFormat::Json)
        );
        assert_eq!(
            ResourceFormat::from_format_param("application/xml+fhir"),
            Some(ResourceFormat::Xml)
        );
        assert_eq!(ResourceFormat::Json.format_param(), "json");
        assert!("yaml".parse::<ResourceFormat>().is_err());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(ResourceFormat::Xml.mime_type(), "application/xml+fhir");
        assert_eq!(ResourceFormat::Xml.feed_mime_type(), "application/atom+xml");
        assert_eq!(ResourceFormat::Json.feed_mime_type(), "application/json+fhir");
    }
}
