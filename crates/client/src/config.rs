//! Client configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FHIR_CLIENT_BASE_URL` | http://localhost:8080/fhir | Service root |
//! | `FHIR_CLIENT_FORMAT` | xml | Preferred wire format (xml, json) |
//! | `FHIR_CLIENT_USE_FORMAT_PARAM` | false | Negotiate with `_format` instead of headers |
//! | `FHIR_CLIENT_TIMEOUT` | 100 | Transport timeout (seconds) |
//! | `FHIR_CLIENT_USER_AGENT` | helios-client/{version} | User agent |
//! | `FHIR_CLIENT_LOG_LEVEL` | info | Log level |
//!
//! # Example
//!
//! ```rust
//! use helios_client::ClientConfig;
//! use helios_client_serde::ResourceFormat;
//!
//! let config = ClientConfig {
//!     base_url: "http://fhir.example.org/fhir".to_string(),
//!     format: ResourceFormat::Json,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;
use helios_client_serde::ResourceFormat;
use url::Url;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("helios-client/", env!("CARGO_PKG_VERSION"));

/// Configuration of a [`FhirClient`](crate::FhirClient).
///
/// Can be read from environment variables with [`ClientConfig::from_env`],
/// from command line arguments with [`ClientConfig::parse`], or built in code.
#[derive(Debug, Clone, Parser)]
#[command(name = "fhir-client")]
#[command(about = "FHIR RESTful API client")]
pub struct ClientConfig {
    /// Service root url of the server.
    #[arg(long, env = "FHIR_CLIENT_BASE_URL", default_value = "http://localhost:8080/fhir")]
    pub base_url: String,

    /// Preferred wire format (xml, json).
    #[arg(long, env = "FHIR_CLIENT_FORMAT", default_value = "xml")]
    pub format: ResourceFormat,

    /// Select the format with the `_format` parameter instead of Accept/Content-Type.
    #[arg(long, env = "FHIR_CLIENT_USE_FORMAT_PARAM", default_value = "false")]
    pub use_format_param: bool,

    /// Transport timeout in seconds.
    #[arg(long, env = "FHIR_CLIENT_TIMEOUT", default_value = "100")]
    pub timeout: u64,

    /// User agent header value.
    #[arg(long, env = "FHIR_CLIENT_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "FHIR_CLIENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/fhir".to_string(),
            format: ResourceFormat::Xml,
            use_format_param: false,
            timeout: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a ClientConfig from environment variables.
    pub fn from_env() -> Self {
        // Try to parse from environment, falling back to defaults
        Self::try_parse_from(["fhir-client"]).unwrap_or_default()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match Url::parse(&self.base_url) {
            Ok(url) if url.cannot_be_a_base() => {
                errors.push(format!("Base url '{}' cannot be a base", self.base_url));
            }
            Ok(url) if url.query().is_some() || url.fragment().is_some() => {
                errors.push("Base url cannot carry a query or fragment".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("Invalid base url '{}': {}", self.base_url, e)),
        }

        if self.timeout == 0 {
            errors.push("Timeout cannot be 0".to_string());
        }

        if self.user_agent.trim().is_empty() {
            errors.push("User agent cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            base_url: "http://localhost:0/fhir".to_string(),
            timeout: 5,
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080/fhir");
        assert_eq!(config.format, ResourceFormat::Xml);
        assert!(!config.use_format_param);
        assert!(config.user_agent.starts_with("helios-client/"));
    }

    #[test]
    fn test_parse_args() {
        let config = ClientConfig::try_parse_from([
            "fhir-client",
            "--base-url",
            "http://fhir.example.org/open",
            "--format",
            "json",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(config.base_url, "http://fhir.example.org/open");
        assert_eq!(config.format, ResourceFormat::Json);
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_validate_valid() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            timeout: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);

        let config = ClientConfig {
            base_url: "http://example.org/fhir?x=1".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
