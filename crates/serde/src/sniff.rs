//! Payload kind detection.
//!
//! Responses do not say whether they carry a single resource, a feed or a tag
//! list, so the codec looks at the payload itself. Detection is per format and
//! pluggable through [`PayloadSniffer`].

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;

/// What a payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A single resource.
    Resource,
    /// A feed of entries.
    Bundle,
    /// A list of tags.
    TagList,
}

/// Decides the payload kind of a document in one format.
pub trait PayloadSniffer: Send + Sync {
    /// Inspects `payload` and reports its kind.
    fn sniff(&self, payload: &[u8]) -> Result<PayloadKind>;
}

/// Decides by the local name of the XML root element.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRootSniffer;

impl PayloadSniffer for XmlRootSniffer {
    fn sniff(&self, payload: &[u8]) -> Result<PayloadKind> {
        let mut reader = Reader::from_reader(payload);
        let mut buf = Vec::new();
        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                SerdeError::malformed(ResourceFormat::Xml, format!("XML parse error: {}", e))
            })?;
            match event {
                Event::Start(start) | Event::Empty(start) => {
                    return Ok(match start.local_name().as_ref() {
                        b"feed" => PayloadKind::Bundle,
                        b"taglist" => PayloadKind::TagList,
                        _ => PayloadKind::Resource,
                    });
                }
                Event::Eof => {
                    return Err(SerdeError::malformed(
                        ResourceFormat::Xml,
                        "document has no root element",
                    ));
                }
                _ => {}
            }
            buf.clear();
        }
    }
}

#[derive(Deserialize)]
struct Head {
    #[serde(rename = "resourceType")]
    resource_type: Option<String>,
}

/// Decides by the top-level `resourceType` of a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResourceTypeSniffer;

impl PayloadSniffer for JsonResourceTypeSniffer {
    fn sniff(&self, payload: &[u8]) -> Result<PayloadKind> {
        let head: Head = serde_json::from_slice(crate::utils::strip_bom(payload)).map_err(|e| {
            SerdeError::malformed(ResourceFormat::Json, format!("invalid JSON: {}", e))
        })?;
        match head.resource_type.as_deref() {
            Some("Bundle") => Ok(PayloadKind::Bundle),
            Some("TagList") => Ok(PayloadKind::TagList),
            Some(_) => Ok(PayloadKind::Resource),
            None => Err(SerdeError::malformed(
                ResourceFormat::Json,
                "missing resourceType",
            )),
        }
    }
}
