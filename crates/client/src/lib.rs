//! # helios-client - FHIR RESTful API Client
//!
//! A synchronous client for FHIR servers of the Atom feed generation: resources
//! are exchanged as XML or JSON, search results and history arrive as feeds,
//! and tags travel in `Category` headers and tag lists.
//!
//! ## Features
//!
//! - **CRUD with versions**: create, read, version read, conditional read,
//!   update (based on a known version) and delete
//! - **Search and paging**: repeated parameters, `_count`, `_id` with
//!   `_include`, and navigation over `first`/`previous`/`next`/`last` links
//! - **History**: instance, type and system history with `_since`
//! - **Tags**: affix, read (server, type, resource and version scope) and remove
//! - **Content negotiation**: `Accept`/`Content-Type` headers or the `_format`
//!   parameter; responses are decoded by the content type the server declares
//!
//! ## Interactions
//!
//! | Operation | HTTP Method | URL Pattern |
//! |-----------|-------------|-------------|
//! | conformance | GET | `/metadata` |
//! | read / vread | GET | `/[type]/[id]` / `/[type]/[id]/_history/[vid]` |
//! | create | POST | `/[type]` |
//! | update | PUT | `/[type]/[id]` |
//! | delete | DELETE | `/[type]/[id]` |
//! | search | GET | `/[type]?params` |
//! | history | GET | `/_history`, `/[type]/_history`, `/[type]/[id]/_history` |
//! | tags | GET / POST / DELETE | `/_tags`, `/[type]/_tags`, `/[type]/[id][/_history/[vid]]/_tags` |
//!
//! ## Errors
//!
//! Every operation returns [`ClientResult`]. [`ClientError::kind`] flattens
//! the error into an [`ErrorKind`]; [`FhirClient::last_response`] tells what
//! the server (if anything) answered.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod paging;
mod request;
pub mod response;
pub mod search;
pub mod transport;

pub use client::{FhirClient, HistoryScope, TagScope};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use paging::{NoSuchPage, PageDirection, navigate};
pub use response::ResponseDetails;
pub use search::{SearchParam, SearchParams};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

/// Initialize logging for the client.
///
/// This should be called once at application startup.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "helios_client={level},helios_client_serde={level},helios_client_model={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
