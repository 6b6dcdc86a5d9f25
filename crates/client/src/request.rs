//! Request construction: endpoint urls and format negotiation.

use helios_client_model::{IdentityError, ResourceIdentity};
use helios_client_serde::ResourceFormat;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Method};
use url::Url;

use crate::error::ClientResult;
use crate::search::{FORMAT_PARAM, SearchParams};
use crate::transport::HttpRequest;

/// What kind of document a request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    Resource,
    Feed,
    TagList,
    Nothing,
}

/// Parses and checks a service root url.
pub(crate) fn parse_base(base_url: &str) -> ClientResult<Url> {
    let url = Url::parse(base_url).map_err(|e| malformed(base_url, e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(malformed(base_url, "not a hierarchical url").into());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(malformed(base_url, "a service root cannot carry a query or fragment").into());
    }
    Ok(url)
}

fn malformed(url: &str, reason: impl Into<String>) -> IdentityError {
    IdentityError::Malformed {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// `{base}/{segments...}`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> ClientResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| malformed(base.as_str(), "not a hierarchical url"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// The url of an identity, resolved against `base` when it is relative, plus
/// trailing `segments`.
pub(crate) fn identity_url(
    base: &Url,
    identity: &ResourceIdentity,
    segments: &[&str],
) -> ClientResult<Url> {
    let located = identity.with_base(base.as_str()).to_url();
    let mut url = Url::parse(&located).map_err(|e| malformed(&located, e.to_string()))?;
    if !segments.is_empty() {
        url.path_segments_mut()
            .map_err(|_| malformed(&located, "not a hierarchical url"))?
            .extend(segments);
    }
    Ok(url)
}

/// Appends `params` to the query, keeping order and repeated names.
pub(crate) fn append_params(url: &mut Url, params: &SearchParams) {
    if params.is_empty() {
        return;
    }
    let mut query = url.query_pairs_mut();
    for param in params {
        query.append_pair(&param.name, &param.value);
    }
}

/// Format negotiation settings of a client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Negotiation {
    pub format: ResourceFormat,
    pub use_format_param: bool,
}

impl Negotiation {
    /// Builds a request, selecting the response format either with `_format`
    /// or with an `Accept` header.
    pub(crate) fn request(&self, method: Method, mut url: Url, expect: Expect) -> HttpRequest {
        if self.use_format_param {
            if !url.query_pairs().any(|(name, _)| name == FORMAT_PARAM) {
                url.query_pairs_mut()
                    .append_pair(FORMAT_PARAM, self.format.format_param());
            }
            return HttpRequest::new(method, url);
        }

        let mut request = HttpRequest::new(method, url);
        let accept = match expect {
            Expect::Feed => Some(self.format.feed_mime_type()),
            Expect::Resource | Expect::TagList => Some(self.format.mime_type()),
            Expect::Nothing => None,
        };
        if let Some(accept) = accept {
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static(accept));
        }
        request
    }

    /// Attaches a body encoded in the negotiated format.
    pub(crate) fn attach_body(&self, request: &mut HttpRequest, body: Vec<u8>) {
        let content_type = match self.format {
            ResourceFormat::Xml => "application/xml+fhir; charset=UTF-8",
            ResourceFormat::Json => "application/json+fhir; charset=UTF-8",
        };
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        request.body = Some(body);
    }
}
