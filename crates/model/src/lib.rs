//! # helios-client-model
//!
//! The protocol-independent model used by the Helios FHIR client:
//!
//! - [`identity`] - [`ResourceIdentity`], the `[base/]Type/id[/_history/vid]` locator
//! - [`validation`] - field validation rules (the id pattern)
//! - [`resource`] - the generic resource graph ([`Resource`], [`Element`], [`Value`])
//! - [`shape`] - [`TypeShape`]s describing resource types to the codec
//! - [`factory`] - ordered model factory resolution
//! - [`tag`] - [`Tag`]s
//! - [`bundle`] - [`ResourceEnvelope`] and [`Bundle`]
//! - [`error`] - error types
//!
//! Nothing in this crate performs I/O; all types are plain values that are
//! safe to share across threads.

#![warn(missing_docs)]

pub mod bundle;
pub mod error;
pub mod factory;
pub mod identity;
pub mod resource;
pub mod shape;
pub mod tag;
pub mod validation;

pub use bundle::{Bundle, BundleLinks, EnvelopeContent, ResourceEnvelope};
pub use error::{FactoryError, IdentityError, ValidationError};
pub use factory::{DefaultModelFactory, ModelFactory, ModelFactoryList, StructureFactory};
pub use identity::ResourceIdentity;
pub use resource::{Element, Field, Primitive, PrimitiveValue, Resource, Value};
pub use shape::{ElementKind, ElementShape, PrimitiveKind, TypeShape};
pub use tag::{
    FHIR_TAG_SCHEME_GENERAL, FHIR_TAG_SCHEME_PROFILE, FHIR_TAG_SCHEME_SECURITY, Tag,
};
