//! What the client remembers about the last exchange.

use chrono::{DateTime, Utc};
use helios_client_model::{Resource, Tag, Value};
use helios_client_serde::{FhirCodec, ResourceFormat};
use http::header::{CONTENT_LOCATION, CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use http::{HeaderMap, Method, StatusCode};

use crate::headers;
use crate::transport::HttpResponse;

/// Details of the most recent request and its response.
///
/// Recorded for every operation, whether it succeeded or not. When the
/// transport failed, `status` is `None` and only the request line is known.
#[derive(Debug, Clone)]
pub struct ResponseDetails {
    pub method: Method,
    pub url: String,
    pub status: Option<StatusCode>,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub content_location: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Tags from the `Category` header.
    pub tags: Vec<Tag>,
    pub headers: HeaderMap,
}

impl ResponseDetails {
    /// Details of a request that got no response.
    pub fn unanswered(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            status: None,
            content_type: None,
            location: None,
            content_location: None,
            last_modified: None,
            tags: Vec::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Details of a request and the response it got.
    pub fn from_response(method: Method, url: impl Into<String>, response: &HttpResponse) -> Self {
        Self {
            status: Some(response.status),
            content_type: response.header(CONTENT_TYPE).map(str::to_string),
            location: response.header(LOCATION).map(str::to_string),
            content_location: response.header(CONTENT_LOCATION).map(str::to_string),
            last_modified: response
                .header(LAST_MODIFIED)
                .and_then(headers::parse_http_date),
            tags: headers::parse_category(&response.headers),
            headers: response.headers.clone(),
            ..Self::unanswered(method, url)
        }
    }

    /// The wire format the server declared for the body, if it declared one we know.
    pub fn format(&self) -> Option<ResourceFormat> {
        self.content_type.as_deref().and_then(ResourceFormat::parse)
    }

    /// True for a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| s.is_success())
    }
}

/// Summarises an `OperationOutcome` error body as `severity: details` items.
///
/// Returns `None` when the body is empty, not decodable, or not an
/// OperationOutcome.
pub(crate) fn outcome_summary(
    codec: &FhirCodec,
    body: &[u8],
    format: ResourceFormat,
) -> Option<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let outcome = codec.decode_resource(body, format).ok()?;
    summarize(&outcome)
}

fn summarize(outcome: &Resource) -> Option<String> {
    if outcome.resource_type() != "OperationOutcome" {
        return None;
    }
    let issues: Vec<String> = outcome
        .body()
        .get_all("issue")
        .iter()
        .filter_map(Value::as_element)
        .map(|issue| {
            let severity = issue.get("severity").and_then(Value::as_str);
            let details = issue
                .get("details")
                .and_then(Value::as_str)
                .or_else(|| issue.get_path("type.display").and_then(Value::as_str));
            match (severity, details) {
                (Some(severity), Some(details)) => format!("{}: {}", severity, details),
                (Some(severity), None) => severity.to_string(),
                (None, Some(details)) => details.to_string(),
                (None, None) => "unspecified issue".to_string(),
            }
        })
        .collect();
    (!issues.is_empty()).then(|| issues.join("; "))
}
