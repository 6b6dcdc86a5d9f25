use crate::format::ResourceFormat;

/// Error types for encoding and decoding FHIR payloads.
#[derive(Debug)]
pub enum SerdeError {
    /// The payload could not be parsed, or parsed into something that is not
    /// a valid resource, feed or tag list.
    MalformedPayload {
        /// Wire format being decoded.
        format: ResourceFormat,
        /// What was wrong.
        message: String,
    },

    /// No model factory handles the resource type named in the payload.
    UnknownResourceType {
        /// The resource type token.
        type_name: String,
    },

    /// JSON serialization error
    Json(serde_json::Error),

    /// XML serialization error
    Xml(quick_xml::Error),

    /// IO error during serialization
    Io(std::io::Error),
}

impl SerdeError {
    pub(crate) fn malformed(format: ResourceFormat, message: impl Into<String>) -> Self {
        SerdeError::MalformedPayload {
            format,
            message: message.into(),
        }
    }

    /// Returns true for errors raised while reading a payload.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SerdeError::MalformedPayload { .. } | SerdeError::UnknownResourceType { .. }
        )
    }
}

impl std::fmt::Display for SerdeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerdeError::MalformedPayload { format, message } => {
                write!(f, "Malformed {} payload: {}", format, message)
            }
            SerdeError::UnknownResourceType { type_name } => {
                write!(f, "Unknown resource type: {}", type_name)
            }
            SerdeError::Json(e) => write!(f, "JSON error: {}", e),
            SerdeError::Xml(e) => write!(f, "XML error: {}", e),
            SerdeError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerdeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerdeError::Json(e) => Some(e),
            SerdeError::Xml(e) => Some(e),
            SerdeError::Io(e) => Some(e),
            SerdeError::MalformedPayload { .. } | SerdeError::UnknownResourceType { .. } => None,
        }
    }
}

impl From<serde_json::Error> for SerdeError {
    fn from(err: serde_json::Error) -> Self {
        SerdeError::Json(err)
    }
}

impl From<quick_xml::Error> for SerdeError {
    fn from(err: quick_xml::Error) -> Self {
        SerdeError::Xml(err)
    }
}

impl From<std::io::Error> for SerdeError {
    fn from(err: std::io::Error) -> Self {
        SerdeError::Io(err)
    }
}

impl From<helios_client_model::FactoryError> for SerdeError {
    fn from(err: helios_client_model::FactoryError) -> Self {
        match err {
            helios_client_model::FactoryError::NoFactoryFound { type_name } => {
                SerdeError::UnknownResourceType { type_name }
            }
        }
    }
}

/// Result type alias for FHIR codec operations
pub type Result<T> = std::result::Result<T, SerdeError>;
