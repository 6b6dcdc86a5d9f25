//! The codec facade.
//!
//! [`FhirCodec`] turns bytes in either wire format into a [`Payload`] and
//! back, resolving every resource type it meets through a
//! [`ModelFactoryList`].

use std::fmt;
use std::sync::Arc;

use helios_client_model::{Bundle, ModelFactoryList, Resource, Tag};
use tracing::debug;

use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;
use crate::json::{self, JsonReader, JsonWriter};
use crate::sniff::{JsonResourceTypeSniffer, PayloadKind, PayloadSniffer, XmlRootSniffer};
use crate::xml::de::XmlReader;
use crate::xml::dom;
use crate::xml::ser::XmlWriter;

/// A decoded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single resource.
    Resource(Resource),
    /// A feed.
    Bundle(Bundle),
    /// A tag list.
    TagList(Vec<Tag>),
}

impl Payload {
    /// The kind of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Resource(_) => PayloadKind::Resource,
            Payload::Bundle(_) => PayloadKind::Bundle,
            Payload::TagList(_) => PayloadKind::TagList,
        }
    }
}

/// Encodes and decodes resources, feeds and tag lists in both wire formats.
///
/// Cloning is cheap; clones share the factory list and sniffers.
#[derive(Clone)]
pub struct FhirCodec {
    factories: Arc<ModelFactoryList>,
    xml_sniffer: Arc<dyn PayloadSniffer>,
    json_sniffer: Arc<dyn PayloadSniffer>,
}

impl FhirCodec {
    /// Creates a codec resolving resource types through `factories`.
    pub fn new(factories: Arc<ModelFactoryList>) -> Self {
        Self {
            factories,
            xml_sniffer: Arc::new(XmlRootSniffer),
            json_sniffer: Arc::new(JsonResourceTypeSniffer),
        }
    }

    /// A codec that accepts every resource type with inferred structure.
    pub fn standard() -> Self {
        Self::new(Arc::new(ModelFactoryList::standard()))
    }

    /// Replaces the payload sniffer for one format.
    pub fn with_sniffer(mut self, format: ResourceFormat, sniffer: Arc<dyn PayloadSniffer>) -> Self {
        match format {
            ResourceFormat::Xml => self.xml_sniffer = sniffer,
            ResourceFormat::Json => self.json_sniffer = sniffer,
        }
        self
    }

    /// The factory list used to resolve resource types.
    pub fn factories(&self) -> &ModelFactoryList {
        &self.factories
    }

    /// Reports what kind of document `payload` holds.
    pub fn sniff(&self, payload: &[u8], format: ResourceFormat) -> Result<PayloadKind> {
        match format {
            ResourceFormat::Xml => self.xml_sniffer.sniff(payload),
            ResourceFormat::Json => self.json_sniffer.sniff(payload),
        }
    }

    /// Decodes a document of any kind.
    pub fn decode(&self, payload: &[u8], format: ResourceFormat) -> Result<Payload> {
        let kind = self.sniff(payload, format)?;
        debug!(%format, ?kind, bytes = payload.len(), "Decoding payload");
        match format {
            ResourceFormat::Json => {
                let value = json::parse(payload)?;
                let reader = JsonReader::new(&self.factories);
                match kind {
                    PayloadKind::Resource => reader.resource(&value).map(Payload::Resource),
                    PayloadKind::Bundle => reader.bundle(&value).map(Payload::Bundle),
                    PayloadKind::TagList => reader.tags(&value).map(Payload::TagList),
                }
            }
            ResourceFormat::Xml => {
                let root = dom::parse_document(payload)?;
                let reader = XmlReader::new(&self.factories);
                match kind {
                    PayloadKind::Resource => reader.resource(&root).map(Payload::Resource),
                    PayloadKind::Bundle => reader.bundle(&root).map(Payload::Bundle),
                    PayloadKind::TagList => reader.tags(&root).map(Payload::TagList),
                }
            }
        }
    }

    /// Decodes a single resource.
    pub fn decode_resource(&self, payload: &[u8], format: ResourceFormat) -> Result<Resource> {
        match self.decode(payload, format)? {
            Payload::Resource(resource) => Ok(resource),
            other => Err(unexpected(format, PayloadKind::Resource, other.kind())),
        }
    }

    /// Decodes a feed.
    pub fn decode_bundle(&self, payload: &[u8], format: ResourceFormat) -> Result<Bundle> {
        match self.decode(payload, format)? {
            Payload::Bundle(bundle) => Ok(bundle),
            other => Err(unexpected(format, PayloadKind::Bundle, other.kind())),
        }
    }

    /// Decodes a tag list.
    pub fn decode_tags(&self, payload: &[u8], format: ResourceFormat) -> Result<Vec<Tag>> {
        match self.decode(payload, format)? {
            Payload::TagList(tags) => Ok(tags),
            other => Err(unexpected(format, PayloadKind::TagList, other.kind())),
        }
    }

    /// Encodes a document. XML is unindented, JSON compact.
    pub fn encode(&self, payload: &Payload, format: ResourceFormat) -> Result<Vec<u8>> {
        match payload {
            Payload::Resource(resource) => self.encode_resource(resource, format),
            Payload::Bundle(bundle) => self.encode_bundle(bundle, format),
            Payload::TagList(tags) => self.encode_tags(tags, format),
        }
    }

    /// Encodes a single resource.
    pub fn encode_resource(&self, resource: &Resource, format: ResourceFormat) -> Result<Vec<u8>> {
        match format {
            ResourceFormat::Json => {
                let value = JsonWriter::new(&self.factories).resource(resource)?;
                Ok(serde_json::to_vec(&value)?)
            }
            ResourceFormat::Xml => {
                let mut writer = XmlWriter::new(Vec::new(), &self.factories);
                writer.declaration()?;
                writer.resource(resource, false)?;
                Ok(writer.into_inner())
            }
        }
    }

    /// Encodes a feed.
    pub fn encode_bundle(&self, bundle: &Bundle, format: ResourceFormat) -> Result<Vec<u8>> {
        match format {
            ResourceFormat::Json => {
                let value = JsonWriter::new(&self.factories).bundle(bundle)?;
                Ok(serde_json::to_vec(&value)?)
            }
            ResourceFormat::Xml => {
                let mut writer = XmlWriter::new(Vec::new(), &self.factories);
                writer.declaration()?;
                writer.feed(bundle)?;
                Ok(writer.into_inner())
            }
        }
    }

    /// Encodes a tag list.
    pub fn encode_tags(&self, tags: &[Tag], format: ResourceFormat) -> Result<Vec<u8>> {
        match format {
            ResourceFormat::Json => {
                let value = JsonWriter::new(&self.factories).tags(tags);
                Ok(serde_json::to_vec(&value)?)
            }
            ResourceFormat::Xml => {
                let mut writer = XmlWriter::new(Vec::new(), &self.factories);
                writer.declaration()?;
                writer.taglist(tags)?;
                Ok(writer.into_inner())
            }
        }
    }

    /// Encodes a document as indented JSON, for display.
    pub fn to_json_string_pretty(&self, payload: &Payload) -> Result<String> {
        let writer = JsonWriter::new(&self.factories);
        let value = match payload {
            Payload::Resource(resource) => writer.resource(resource)?,
            Payload::Bundle(bundle) => writer.bundle(bundle)?,
            Payload::TagList(tags) => writer.tags(tags),
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

impl Default for FhirCodec {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for FhirCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FhirCodec")
            .field("factories", &self.factories)
            .finish_non_exhaustive()
    }
}

fn unexpected(format: ResourceFormat, expected: PayloadKind, found: PayloadKind) -> SerdeError {
    SerdeError::malformed(
        format,
        format!("expected a {:?} payload, found a {:?}", expected, found),
    )
}
