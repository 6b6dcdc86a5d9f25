//! Error types for the model layer.
//!
//! Identity parsing, field validation and model factory resolution each have
//! their own error enum so callers can match on exactly the failure they care
//! about. The client crate wraps all of them into its `ClientError`.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::validation::FieldRule;

/// Errors raised while parsing or composing a [`ResourceIdentity`](crate::ResourceIdentity).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The locator does not have the `[base/]type/id[/_history/version]` shape.
    #[error("malformed resource identity '{url}': {reason}")]
    Malformed { url: String, reason: String },

    /// The id or version id does not match the identifier grammar.
    #[error("invalid identifier '{value}': not a correctly formatted id")]
    InvalidIdentifier { value: String },
}

impl IdentityError {
    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        IdentityError::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// A value failed the validation rule registered for its field role.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value '{value}' does not satisfy the {rule} rule")]
pub struct ValidationError {
    pub rule: FieldRule,
    pub value: String,
}

impl From<ValidationError> for IdentityError {
    fn from(err: ValidationError) -> Self {
        match err.rule {
            FieldRule::Id => IdentityError::InvalidIdentifier { value: err.value },
            FieldRule::ResourceName => IdentityError::Malformed {
                reason: format!("'{}' is not a resource type name", err.value),
                url: err.value,
            },
        }
    }
}

/// Errors raised by the model factory registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// No registered factory accepted the type token.
    #[error("no model factory can create resource type '{type_name}'")]
    NoFactoryFound { type_name: String },
}
