//! Error types for client operations.
//!
//! Every failure a [`FhirClient`](crate::FhirClient) call can report is a
//! [`ClientError`]. Errors from the model and codec crates are wrapped as they
//! are; protocol level failures carry the request line and, when the server
//! sent an `OperationOutcome`, a summary of its issues.
//!
//! | Status / cause | Error |
//! |----------------|-------|
//! | 404 | `ResourceNotFound` |
//! | 410 | `ResourceGone` |
//! | other non-2xx | `Protocol` |
//! | timeout, refused connection, broken body | `Transport` |
//! | missing page link | `NoSuchPage` |

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use helios_client_model::{FactoryError, IdentityError};
use helios_client_serde::SerdeError;
use http::{Method, StatusCode};
use thiserror::Error;

use crate::paging::NoSuchPage;
use crate::transport::TransportError;

/// The error type of every client operation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error(transparent)]
    Serde(#[from] SerdeError),

    #[error("resource not found: {method} {url}{}", detail(.message))]
    ResourceNotFound {
        method: Method,
        url: String,
        message: Option<String>,
    },

    #[error("resource gone: {method} {url}{}", detail(.message))]
    ResourceGone {
        method: Method,
        url: String,
        message: Option<String>,
    },

    #[error(transparent)]
    NoSuchPage(#[from] NoSuchPage),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("{method} {url} returned {status}{}", detail(.message))]
    Protocol {
        method: Method,
        url: String,
        status: StatusCode,
        message: Option<String>,
    },
}

fn detail(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

/// The flat classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedIdentity,
    InvalidIdentifier,
    NoFactoryFound,
    MalformedPayload,
    UnknownResourceType,
    ResourceNotFound,
    ResourceGone,
    NoSuchPage,
    Transport,
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ClientError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Identity(IdentityError::Malformed { .. }) => ErrorKind::MalformedIdentity,
            ClientError::Identity(IdentityError::InvalidIdentifier { .. }) => {
                ErrorKind::InvalidIdentifier
            }
            ClientError::Factory(FactoryError::NoFactoryFound { .. }) => ErrorKind::NoFactoryFound,
            ClientError::Serde(SerdeError::UnknownResourceType { .. }) => {
                ErrorKind::UnknownResourceType
            }
            ClientError::Serde(_) => ErrorKind::MalformedPayload,
            ClientError::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            ClientError::ResourceGone { .. } => ErrorKind::ResourceGone,
            ClientError::NoSuchPage(_) => ErrorKind::NoSuchPage,
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// The HTTP status behind the error, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::ResourceNotFound { .. } => Some(StatusCode::NOT_FOUND),
            ClientError::ResourceGone { .. } => Some(StatusCode::GONE),
            ClientError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
