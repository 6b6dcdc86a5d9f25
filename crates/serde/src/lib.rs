//! # Helios FHIR Client Serialization
//!
//! JSON and XML codecs for the resource graph of `helios-client-model`,
//! including the Atom-era feed and tag list documents.
//!
//! ## Features
//!
//! - **Both wire formats**: resources, feeds (Atom XML / JSON bundle) and tag
//!   lists in XML and JSON.
//! - **Shape driven**: element cardinality, primitive kinds and XML element
//!   order come from the [`TypeShape`](helios_client_model::TypeShape) that
//!   the model factory list resolves for each resource type.
//! - **Payload sniffing**: [`FhirCodec::decode`] works out whether a document
//!   is a resource, a feed or a tag list; the rule is pluggable per format via
//!   [`PayloadSniffer`].
//!
//! ## FHIR JSON ↔ XML Mapping
//!
//! | JSON Pattern | XML Pattern |
//! |--------------|-------------|
//! | `{"active": true}` | `<active value="true"/>` |
//! | `{"birthDate": "1974-12-25", "_birthDate": {"id": "123"}}` | `<birthDate id="123" value="1974-12-25"/>` |
//! | `{"given": ["John", "Doe"]}` | `<given value="John"/><given value="Doe"/>` |
//! | `{"given": ["A", null], "_given": [null, {"id": "123"}]}` | `<given value="A"/><given id="123"/>` |
//!
//! ## Example
//!
//! ```rust
//! use helios_client_serde::{FhirCodec, ResourceFormat};
//!
//! let codec = FhirCodec::standard();
//! let xml = br#"<Organization xmlns="http://hl7.org/fhir"><name value="Furore"/></Organization>"#;
//! let organization = codec.decode_resource(xml, ResourceFormat::Xml)?;
//!
//! let json = codec.encode_resource(&organization, ResourceFormat::Json)?;
//! assert_eq!(json, br#"{"resourceType":"Organization","name":"Furore"}"#);
//! # Ok::<(), helios_client_serde::SerdeError>(())
//! ```

pub mod codec;
pub mod error;
pub mod format;
mod json;
pub mod sniff;
pub mod utils;
mod xml;

pub use codec::{FhirCodec, Payload};
pub use error::{Result, SerdeError};
pub use format::{ATOM_MIME_TYPE, JSON_MIME_TYPE, ResourceFormat, XML_MIME_TYPE};
pub use sniff::{JsonResourceTypeSniffer, PayloadKind, PayloadSniffer, XmlRootSniffer};
