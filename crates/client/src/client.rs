//! The protocol client.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use helios_client_model::validation::{self, FieldRule};
use helios_client_model::{
    Bundle, EnvelopeContent, IdentityError, Resource, ResourceEnvelope, ResourceIdentity, Tag,
};
use helios_client_serde::{FhirCodec, ResourceFormat};
use http::header::{CONTENT_LOCATION, IF_MODIFIED_SINCE, LOCATION};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::headers;
use crate::paging::{self, PageDirection};
use crate::request::{self, Expect, Negotiation};
use crate::response::{ResponseDetails, outcome_summary};
use crate::search::{COUNT_PARAM, ID_PARAM, INCLUDE_PARAM, SINCE_PARAM, SearchParams};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

const METADATA_SEGMENT: &str = "metadata";
const HISTORY_SEGMENT: &str = "_history";
const TAGS_SEGMENT: &str = "_tags";

/// Where to read history from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    /// Every change on the server.
    System,
    /// Changes to resources of one type.
    Type(String),
    /// Versions of one resource.
    Instance(ResourceIdentity),
}

/// Where to read tags from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagScope {
    /// Every tag in use on the server.
    All,
    /// Tags in use on resources of one type.
    Type(String),
    /// Tags of one resource, or of one version when the identity is versioned.
    Resource(ResourceIdentity),
}

/// How a failed status is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classify {
    /// Every non-2xx status is a protocol error.
    Plain,
    /// 404 and 410 are reported as missing and deleted resources.
    Resource,
    /// As `Resource`, and 304 is an answer.
    Conditional,
}

/// A client for one FHIR server.
///
/// Each call builds one request, hands it to the [`Transport`], classifies the
/// response and decodes the body with the format the server declared (the
/// preferred format when it declared none). Details of the exchange are kept
/// until the next call and are available through
/// [`last_response`](Self::last_response), for failed calls too.
///
/// ```rust,no_run
/// use helios_client::{FhirClient, SearchParams};
///
/// let mut client = FhirClient::new("http://fhir.example.org/fhir")?;
/// let location = client.read_by_id("Location", "1", None)?;
/// println!("version {:?}", location.version_id());
///
/// let params = SearchParams::new().with("name", "Eve");
/// let page = client.search("Patient", &params, Some(10))?;
/// println!("{} of {:?} patients", page.len(), page.total_results);
/// # Ok::<(), helios_client::ClientError>(())
/// ```
pub struct FhirClient {
    base: Url,
    codec: FhirCodec,
    transport: Arc<dyn Transport>,
    negotiation: Negotiation,
    last_response: Option<ResponseDetails>,
}

impl FhirClient {
    /// Creates a client for `base_url` with the default configuration.
    ///
    /// The default codec infers structure from the wire. Booleans, numbers and
    /// single-element lists survive a round trip within one format, but may
    /// come back as strings or single values when a resource read as JSON is
    /// sent as XML (or the reverse). Use [`with_codec`](Self::with_codec) with
    /// declared type shapes when resources cross formats.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::from_config(&ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        })
    }

    /// Creates a client over HTTP from a configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config).map_err(|source| ClientError::Transport {
            url: config.base_url.clone(),
            source,
        })?;
        let mut client = Self::with_transport(&config.base_url, transport)?;
        client.negotiation = Negotiation {
            format: config.format,
            use_format_param: config.use_format_param,
        };
        Ok(client)
    }

    /// Creates a client sending its requests through `transport`.
    pub fn with_transport(base_url: &str, transport: impl Transport + 'static) -> ClientResult<Self> {
        Ok(Self {
            base: request::parse_base(base_url)?,
            codec: FhirCodec::standard(),
            transport: Arc::new(transport),
            negotiation: Negotiation {
                format: ResourceFormat::default(),
                use_format_param: false,
            },
            last_response: None,
        })
    }

    /// Replaces the codec, e.g. with one that knows declared type shapes.
    ///
    /// Cross-format fidelity (XML to JSON and back) is only guaranteed for
    /// types with declared shapes; see [`FhirCodec`].
    pub fn with_codec(mut self, codec: FhirCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn codec(&self) -> &FhirCodec {
        &self.codec
    }

    pub fn preferred_format(&self) -> ResourceFormat {
        self.negotiation.format
    }

    pub fn set_preferred_format(&mut self, format: ResourceFormat) {
        self.negotiation.format = format;
    }

    pub fn use_format_param(&self) -> bool {
        self.negotiation.use_format_param
    }

    /// Negotiate the format with `_format` instead of `Accept`/`Content-Type`.
    pub fn set_use_format_param(&mut self, use_format_param: bool) {
        self.negotiation.use_format_param = use_format_param;
    }

    /// Details of the last exchange.
    ///
    /// Every operation clears this first, so an operation that fails before
    /// anything is sent leaves `None` rather than the previous call's answer.
    pub fn last_response(&self) -> Option<&ResponseDetails> {
        self.last_response.as_ref()
    }

    /// Fetches the server's conformance statement.
    pub fn conformance(&mut self) -> ClientResult<Resource> {
        self.last_response = None;
        let url = request::endpoint(&self.base, &[METADATA_SEGMENT])?;
        let request = self.negotiation.request(Method::GET, url, Expect::Resource);
        let response = self.execute(request, Classify::Plain)?;
        Ok(self.codec.decode_resource(&response.body, self.body_format(&response))?)
    }

    /// Reads a resource; a versioned identity reads that version.
    pub fn read(&mut self, identity: &ResourceIdentity) -> ClientResult<ResourceEnvelope> {
        self.last_response = None;
        let url = request::identity_url(&self.base, identity, &[])?;
        let request = self.negotiation.request(Method::GET, url, Expect::Resource);
        let response = self.execute(request, Classify::Resource)?;
        let resource = self.codec.decode_resource(&response.body, self.body_format(&response))?;
        let envelope = self.envelope(identity, &response, resource, &[CONTENT_LOCATION, LOCATION])?;
        Ok(envelope)
    }

    /// Reads a resource by type and id, optionally a specific version.
    pub fn read_by_id(
        &mut self,
        resource_type: &str,
        id: &str,
        version_id: Option<&str>,
    ) -> ClientResult<ResourceEnvelope> {
        self.last_response = None;
        let identity =
            ResourceIdentity::compose(Some(self.base.as_str()), resource_type, id, version_id)?;
        self.read(&identity)
    }

    /// Re-reads the resource of `envelope` unless it is unchanged since
    /// `envelope.updated`; `None` means unchanged.
    pub fn read_if_changed(
        &mut self,
        envelope: &ResourceEnvelope,
    ) -> ClientResult<Option<ResourceEnvelope>> {
        self.last_response = None;
        let identity = envelope.id.without_version();
        let url = request::identity_url(&self.base, &identity, &[])?;
        let mut request = self.negotiation.request(Method::GET, url, Expect::Resource);
        if let Some(updated) = &envelope.updated {
            let value = header_value(&url_of(&request), &headers::format_http_date(updated))?;
            request.headers.insert(IF_MODIFIED_SINCE, value);
        }
        let response = self.execute(request, Classify::Conditional)?;
        if response.status == StatusCode::NOT_MODIFIED {
            debug!(identity = %identity, "Resource not modified");
            return Ok(None);
        }
        let resource = self.codec.decode_resource(&response.body, self.body_format(&response))?;
        let envelope = self.envelope(&identity, &response, resource, &[CONTENT_LOCATION, LOCATION])?;
        Ok(Some(envelope))
    }

    /// Creates a resource, with optional tags, and returns its envelope.
    ///
    /// The envelope's `id` is the new logical identity; its `self_link` names
    /// the version that was created.
    /// A resource type the codec has no factory for fails with
    /// `NoFactoryFound` before anything is sent.
    pub fn create(&mut self, resource: &Resource, tags: &[Tag]) -> ClientResult<ResourceEnvelope> {
        self.last_response = None;
        let resource_type = resource.resource_type();
        validation::validate(FieldRule::ResourceName, resource_type).map_err(IdentityError::from)?;
        self.codec.factories().find_factory(resource_type)?;
        let url = request::endpoint(&self.base, &[resource_type])?;
        let mut request = self.negotiation.request(Method::POST, url, Expect::Resource);
        self.negotiation
            .attach_body(&mut request, self.codec.encode_resource(resource, self.negotiation.format)?);
        if !tags.is_empty() {
            let value = category_value(&url_of(&request), tags)?;
            request.headers.insert(&headers::CATEGORY, value);
        }

        let response = self.execute(request, Classify::Resource)?;
        let location = self
            .located(&response, &[LOCATION, CONTENT_LOCATION])?
            .ok_or_else(|| self.missing_location(&response))?;
        let stored = self.returned_resource(&response, resource)?;
        let mut envelope = self.envelope(&location, &response, stored, &[])?;
        if envelope.tags.is_empty() {
            envelope.tags = tags.to_vec();
        }
        Ok(envelope)
    }

    /// Stores a new version of the envelope's resource.
    ///
    /// The envelope's `self_link`, when present, is sent as the version the
    /// update is based on. The returned envelope keeps the `id` and carries the
    /// new version in `self_link`.
    pub fn update(&mut self, envelope: &ResourceEnvelope) -> ClientResult<ResourceEnvelope> {
        self.last_response = None;
        let identity = envelope.id.without_version();
        let url = request::identity_url(&self.base, &identity, &[])?;
        let Some(resource) = envelope.resource() else {
            return Err(ClientError::ResourceGone {
                method: Method::PUT,
                url: url.to_string(),
                message: Some("the envelope holds a deletion, not a resource".to_string()),
            });
        };
        self.codec.factories().find_factory(resource.resource_type())?;

        let mut request = self.negotiation.request(Method::PUT, url, Expect::Resource);
        self.negotiation
            .attach_body(&mut request, self.codec.encode_resource(resource, self.negotiation.format)?);
        if let Some(self_link) = &envelope.self_link {
            let self_link = self_link.with_base(self.base.as_str()).to_url();
            let value = header_value(&url_of(&request), &self_link)?;
            request.headers.insert(CONTENT_LOCATION, value);
        }
        if !envelope.tags.is_empty() {
            let value = category_value(&url_of(&request), &envelope.tags)?;
            request.headers.insert(&headers::CATEGORY, value);
        }

        let response = self.execute(request, Classify::Resource)?;
        let stored = self.returned_resource(&response, resource)?;
        let mut updated = self.envelope(&identity, &response, stored, &[LOCATION, CONTENT_LOCATION])?;
        updated.id = envelope.id.clone();
        if updated.tags.is_empty() {
            updated.tags = envelope.tags.clone();
        }
        Ok(updated)
    }

    /// Deletes the resource of an envelope.
    pub fn delete(&mut self, envelope: &ResourceEnvelope) -> ClientResult<()> {
        self.delete_identity(&envelope.id)
    }

    /// Deletes a resource. Reads of it fail with `ResourceGone` afterwards.
    pub fn delete_identity(&mut self, identity: &ResourceIdentity) -> ClientResult<()> {
        self.last_response = None;
        let url = request::identity_url(&self.base, &identity.without_version(), &[])?;
        let request = self.negotiation.request(Method::DELETE, url, Expect::Nothing);
        self.execute(request, Classify::Resource)?;
        Ok(())
    }

    /// Searches resources of one type. `count` bounds the page size.
    pub fn search(
        &mut self,
        resource_type: &str,
        params: &SearchParams,
        count: Option<usize>,
    ) -> ClientResult<Bundle> {
        self.last_response = None;
        validation::validate(FieldRule::ResourceName, resource_type).map_err(IdentityError::from)?;
        let mut url = request::endpoint(&self.base, &[resource_type])?;
        let mut params = params.clone();
        if let Some(count) = count {
            params.add(COUNT_PARAM, count.to_string());
        }
        request::append_params(&mut url, &params);
        self.fetch_bundle(url)
    }

    /// Searches one resource by id, with `_include` directives for the
    /// resources it references.
    pub fn search_by_id(
        &mut self,
        resource_type: &str,
        id: &str,
        includes: &[&str],
    ) -> ClientResult<Bundle> {
        self.last_response = None;
        validation::validate(FieldRule::Id, id).map_err(IdentityError::from)?;
        let mut params = SearchParams::new().with(ID_PARAM, id);
        for include in includes {
            params.add(INCLUDE_PARAM, *include);
        }
        self.search(resource_type, &params, None)
    }

    /// Fetches another page of a paged result.
    pub fn continue_search(
        &mut self,
        bundle: &Bundle,
        direction: PageDirection,
    ) -> ClientResult<Bundle> {
        self.last_response = None;
        let url = paging::navigate(bundle, direction)?;
        debug!(%direction, url = %url, "Following page link");
        self.fetch_bundle(url)
    }

    /// Reads history, optionally only changes after `since`.
    pub fn history(
        &mut self,
        scope: &HistoryScope,
        since: Option<DateTime<Utc>>,
        count: Option<usize>,
    ) -> ClientResult<Bundle> {
        self.last_response = None;
        let mut url = match scope {
            HistoryScope::System => request::endpoint(&self.base, &[HISTORY_SEGMENT])?,
            HistoryScope::Type(resource_type) => {
                validation::validate(FieldRule::ResourceName, resource_type)
                    .map_err(IdentityError::from)?;
                request::endpoint(&self.base, &[resource_type.as_str(), HISTORY_SEGMENT])?
            }
            HistoryScope::Instance(identity) => request::identity_url(
                &self.base,
                &identity.without_version(),
                &[HISTORY_SEGMENT],
            )?,
        };
        let mut params = SearchParams::new();
        if let Some(since) = since {
            params.add(SINCE_PARAM, since.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        if let Some(count) = count {
            params.add(COUNT_PARAM, count.to_string());
        }
        request::append_params(&mut url, &params);
        self.fetch_bundle(url)
    }

    /// Reads the tags in use at a scope.
    pub fn get_tags(&mut self, scope: &TagScope) -> ClientResult<Vec<Tag>> {
        self.last_response = None;
        let url = self.tags_url(scope)?;
        let request = self.negotiation.request(Method::GET, url, Expect::TagList);
        let response = self.execute(request, Classify::Resource)?;
        Ok(self.codec.decode_tags(&response.body, self.body_format(&response))?)
    }

    /// Every tag in use on the server.
    pub fn get_all_tags(&mut self) -> ClientResult<Vec<Tag>> {
        self.get_tags(&TagScope::All)
    }

    /// Tags in use on resources of one type.
    pub fn get_type_tags(&mut self, resource_type: &str) -> ClientResult<Vec<Tag>> {
        self.get_tags(&TagScope::Type(resource_type.to_string()))
    }

    /// Tags of a resource, or of a version when `identity` is versioned.
    pub fn get_resource_tags(&mut self, identity: &ResourceIdentity) -> ClientResult<Vec<Tag>> {
        self.get_tags(&TagScope::Resource(identity.clone()))
    }

    /// Adds tags to a resource (or to one version of it).
    pub fn affix_tags(&mut self, identity: &ResourceIdentity, tags: &[Tag]) -> ClientResult<()> {
        self.send_tags(Method::POST, identity, tags)
    }

    /// Removes tags from a resource (or from one version of it).
    pub fn delete_tags(&mut self, identity: &ResourceIdentity, tags: &[Tag]) -> ClientResult<()> {
        self.send_tags(Method::DELETE, identity, tags)
    }

    fn send_tags(
        &mut self,
        method: Method,
        identity: &ResourceIdentity,
        tags: &[Tag],
    ) -> ClientResult<()> {
        self.last_response = None;
        let url = self.tags_url(&TagScope::Resource(identity.clone()))?;
        let mut request = self.negotiation.request(method, url, Expect::Nothing);
        self.negotiation
            .attach_body(&mut request, self.codec.encode_tags(tags, self.negotiation.format)?);
        self.execute(request, Classify::Resource)?;
        Ok(())
    }

    fn tags_url(&self, scope: &TagScope) -> ClientResult<Url> {
        match scope {
            TagScope::All => request::endpoint(&self.base, &[TAGS_SEGMENT]),
            TagScope::Type(resource_type) => {
                validation::validate(FieldRule::ResourceName, resource_type)
                    .map_err(IdentityError::from)?;
                request::endpoint(&self.base, &[resource_type.as_str(), TAGS_SEGMENT])
            }
            TagScope::Resource(identity) => {
                request::identity_url(&self.base, identity, &[TAGS_SEGMENT])
            }
        }
    }

    fn fetch_bundle(&mut self, url: Url) -> ClientResult<Bundle> {
        let request = self.negotiation.request(Method::GET, url, Expect::Feed);
        let response = self.execute(request, Classify::Resource)?;
        Ok(self.codec.decode_bundle(&response.body, self.body_format(&response))?)
    }

    /// Sends a request, records the exchange and classifies the status.
    fn execute(&mut self, request: HttpRequest, classify: Classify) -> ClientResult<HttpResponse> {
        let method = request.method.clone();
        let url = request.url.to_string();
        debug!(%method, %url, "Sending request");

        let response = match self.transport.execute(request) {
            Ok(response) => response,
            Err(source) => {
                warn!(%method, %url, error = %source, "Transport failure");
                self.last_response = Some(ResponseDetails::unanswered(method, url.clone()));
                return Err(ClientError::Transport { url, source });
            }
        };

        let status = response.status;
        debug!(%method, %url, status = status.as_u16(), bytes = response.body.len(), "Received response");
        self.last_response = Some(ResponseDetails::from_response(
            method.clone(),
            url.clone(),
            &response,
        ));

        if status.is_success()
            || (status == StatusCode::NOT_MODIFIED && classify == Classify::Conditional)
        {
            return Ok(response);
        }

        warn!(%method, %url, status = status.as_u16(), "Server returned an error status");
        let message = outcome_summary(&self.codec, &response.body, self.body_format(&response));
        let resource_scoped = classify != Classify::Plain;
        Err(match status {
            StatusCode::NOT_FOUND if resource_scoped => ClientError::ResourceNotFound {
                method,
                url,
                message,
            },
            StatusCode::GONE if resource_scoped => ClientError::ResourceGone {
                method,
                url,
                message,
            },
            _ => ClientError::Protocol {
                method,
                url,
                status,
                message,
            },
        })
    }

    /// The format of a response body: as declared, else the preferred one.
    fn body_format(&self, response: &HttpResponse) -> ResourceFormat {
        response
            .header(http::header::CONTENT_TYPE)
            .and_then(ResourceFormat::parse)
            .unwrap_or(self.negotiation.format)
    }

    /// The first of `names` that carries an identity, resolved against the base.
    fn located(
        &self,
        response: &HttpResponse,
        names: &[HeaderName],
    ) -> ClientResult<Option<ResourceIdentity>> {
        match names.iter().find_map(|name| response.header(name)) {
            Some(location) => {
                let identity = ResourceIdentity::parse(location.trim())?;
                Ok(Some(identity.with_base(self.base.as_str())))
            }
            None => Ok(None),
        }
    }

    /// Builds the envelope of a single resource response.
    ///
    /// The identity comes from the first location header in `names`, falling
    /// back to `requested`; a versioned identity becomes the self link.
    fn envelope(
        &self,
        requested: &ResourceIdentity,
        response: &HttpResponse,
        resource: Resource,
        names: &[HeaderName],
    ) -> ClientResult<ResourceEnvelope> {
        let located = self
            .located(response, names)?
            .unwrap_or_else(|| requested.with_base(self.base.as_str()));
        let self_link = located.is_versioned().then(|| located.clone());
        let last_modified = response
            .header(http::header::LAST_MODIFIED)
            .and_then(headers::parse_http_date);
        Ok(ResourceEnvelope {
            id: located.without_version(),
            self_link,
            title: None,
            updated: last_modified,
            tags: headers::parse_category(&response.headers),
            content: EnvelopeContent::Resource(resource),
        })
    }

    /// The resource a create or update response returned, or the one sent
    /// when the body is empty.
    fn returned_resource(&self, response: &HttpResponse, sent: &Resource) -> ClientResult<Resource> {
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(sent.clone());
        }
        Ok(self.codec.decode_resource(&response.body, self.body_format(response))?)
    }

    fn missing_location(&self, response: &HttpResponse) -> ClientError {
        let (method, url) = self
            .last_response
            .as_ref()
            .map(|d| (d.method.clone(), d.url.clone()))
            .unwrap_or((Method::POST, self.base.to_string()));
        ClientError::Protocol {
            method,
            url,
            status: response.status,
            message: Some("response carries no Location header".to_string()),
        }
    }
}

impl std::fmt::Debug for FhirClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirClient")
            .field("base", &self.base.as_str())
            .field("negotiation", &self.negotiation)
            .field("last_response", &self.last_response)
            .finish_non_exhaustive()
    }
}

fn url_of(request: &HttpRequest) -> String {
    request.url.to_string()
}

fn header_value(url: &str, value: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ClientError::Transport {
        url: url.to_string(),
        source: TransportError::InvalidRequest(format!("'{}' is not a header value: {}", value, e)),
    })
}

fn category_value(url: &str, tags: &[Tag]) -> ClientResult<HeaderValue> {
    headers::format_category(tags).map_err(|e| ClientError::Transport {
        url: url.to_string(),
        source: TransportError::InvalidRequest(format!("tags cannot form a Category header: {}", e)),
    })
}
