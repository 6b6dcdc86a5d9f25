//! Shared fixtures for client integration tests.

#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;

use helios_client::FhirClient;
use helios_client_model::{Element, FHIR_TAG_SCHEME_GENERAL, Resource, Tag};

pub use mock_server::{BASE_URL, MockServer, RecordedRequest, UnreachableTransport};

/// A fresh server and a client bound to it.
pub fn setup() -> (Arc<MockServer>, FhirClient) {
    let server = MockServer::new();
    let client = server.client();
    (server, client)
}

pub fn organization(name: &str) -> Resource {
    let mut organization = Resource::new("Organization");
    organization
        .body_mut()
        .set("name", name)
        .push(
            "telecom",
            Element::new().with("system", "phone").with("value", "+31 20 555 0100"),
        );
    organization
}

pub fn patient(family: &str, given: &str) -> Resource {
    let mut patient = Resource::new("Patient");
    patient
        .body_mut()
        .push("name", Element::new().with("family", family).with("given", given))
        .set("gender", "female");
    patient
}

pub fn vip_tag() -> Tag {
    Tag::new("http://example.org/tags/vip", FHIR_TAG_SCHEME_GENERAL, "VIP")
}

pub fn review_tag() -> Tag {
    Tag::general("http://example.org/tags/needs-review")
}
