//! Shared helpers for the codec integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use helios_client_model::{ModelFactoryList, TypeShape};
use helios_client_serde::FhirCodec;

/// Directory holding the fixture documents.
pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

/// Reads `tests/data/{relative}`.
pub fn fixture(relative: &str) -> Vec<u8> {
    let path = data_dir().join(relative);
    std::fs::read(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

/// Type shapes for the fixture resource types.
pub fn shapes() -> Vec<TypeShape> {
    let json = String::from_utf8(fixture("shapes.json")).expect("shapes.json is UTF-8");
    TypeShape::list_from_json_str(&json).expect("shapes.json is a list of type shapes")
}

/// A codec knowing the fixture shapes, falling back to inferred structure.
pub fn codec() -> FhirCodec {
    FhirCodec::new(Arc::new(ModelFactoryList::with_shapes(shapes())))
}
