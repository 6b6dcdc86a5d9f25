//! An in-memory server speaking the feed-era REST protocol, used as a
//! [`Transport`] so client tests run without a network.
//!
//! It keeps every version of every resource, honours `_format` and `Accept`,
//! pages search results with `_count`/`page`, serves history and tags at all
//! scopes, and answers errors with an OperationOutcome body.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use helios_client::headers::{CATEGORY, format_category, format_http_date, parse_category, parse_http_date};
use helios_client::{FhirClient, HttpRequest, HttpResponse, Transport, TransportError};
use helios_client_model::tag::{merge_tags, remove_tags};
use helios_client_model::{Bundle, Element, ResourceEnvelope, ResourceIdentity, Resource, Tag, Value};
use helios_client_serde::{FhirCodec, ResourceFormat};
use http::header::{ACCEPT, CONTENT_LOCATION, CONTENT_TYPE, HeaderName, IF_MODIFIED_SINCE, LAST_MODIFIED, LOCATION};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use url::Url;

pub const BASE_URL: &str = "http://fhir.test/fhir";
const DEFAULT_PAGE_SIZE: usize = 10;

/// A request as the server received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    /// Every value of query parameter `name`, in order.
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.url
            .query_pairs()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.into_owned())
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Version {
    number: u32,
    resource: Option<Resource>,
    tags: Vec<Tag>,
    updated: DateTime<Utc>,
}

#[derive(Debug)]
struct Stored {
    resource_type: String,
    id: String,
    versions: Vec<Version>,
}

impl Stored {
    fn latest(&self) -> &Version {
        &self.versions[self.versions.len() - 1]
    }

    fn is_deleted(&self) -> bool {
        self.latest().resource.is_none()
    }
}

#[derive(Debug)]
struct State {
    resources: Vec<Stored>,
    next_id: u32,
    clock: DateTime<Utc>,
    requests: Vec<RecordedRequest>,
}

/// The in-memory server.
pub struct MockServer {
    base: Url,
    codec: FhirCodec,
    state: Mutex<State>,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Url::parse(BASE_URL).expect("valid base url"),
            codec: FhirCodec::standard(),
            state: Mutex::new(State {
                resources: Vec::new(),
                next_id: 1,
                clock: Utc.with_ymd_and_hms(2014, 8, 18, 0, 0, 0).unwrap(),
                requests: Vec::new(),
            }),
        })
    }

    /// A client talking to this server.
    pub fn client(self: &Arc<Self>) -> FhirClient {
        FhirClient::with_transport(BASE_URL, Arc::clone(self)).expect("valid client")
    }

    /// Stores a resource directly, as version 1, and returns its identity.
    pub fn seed(&self, resource: Resource) -> ResourceIdentity {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let updated = state.tick();
        let resource_type = resource.resource_type().to_string();
        state.resources.push(Stored {
            resource_type: resource_type.clone(),
            id: id.clone(),
            versions: vec![Version {
                number: 1,
                resource: Some(resource),
                tags: Vec::new(),
                updated,
            }],
        });
        ResourceIdentity::compose(Some(BASE_URL), &resource_type, &id, None).unwrap()
    }

    /// Moves the server clock forward.
    pub fn advance(&self, seconds: i64) {
        let mut state = self.state.lock();
        state.clock += Duration::seconds(seconds);
    }

    /// The current server time.
    pub fn now(&self) -> DateTime<Utc> {
        self.state.lock().clock
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.state
            .lock()
            .requests
            .last()
            .cloned()
            .expect("a request was made")
    }

    fn handle(&self, state: &mut State, request: &HttpRequest) -> HttpResponse {
        let format = response_format(request);
        let Some(segments) = self.segments(&request.url) else {
            return self.outcome(StatusCode::NOT_FOUND, format, "not under the service root");
        };
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let method = request.method.clone();

        match (method, segments.as_slice()) {
            (Method::GET, ["metadata"]) => self.conformance(format),
            (Method::GET, ["_tags"]) => self.tag_list(format, state.tags_in_use(None)),
            (Method::GET, ["_history"]) => self.history(state, request, format, |_| true),
            (Method::GET, [t]) => self.search(state, request, format, t),
            (Method::POST, [t]) => self.create(state, request, format, t),
            (Method::GET, [t, "_tags"]) => self.tag_list(format, state.tags_in_use(Some(t))),
            (Method::GET, [t, "_history"]) => {
                self.history(state, request, format, |s| s.resource_type == *t)
            }
            (Method::GET, [t, id]) => self.read(state, request, format, t, id, None),
            (Method::PUT, [t, id]) => self.update(state, request, format, t, id),
            (Method::DELETE, [t, id]) => self.delete(state, format, t, id),
            (m, [t, id, "_tags"]) => self.tags(state, request, format, m, t, id, None),
            (Method::GET, [t, id, "_history"]) => {
                self.history(state, request, format, |s| s.resource_type == *t && s.id == *id)
            }
            (Method::GET, [t, id, "_history", v]) => {
                self.read(state, request, format, t, id, v.parse().ok())
            }
            (m, [t, id, "_history", v, "_tags"]) => match v.parse().ok() {
                Some(v) => self.tags(state, request, format, m, t, id, Some(v)),
                None => self.outcome(StatusCode::NOT_FOUND, format, "unknown version"),
            },
            (m, _) => self.outcome(
                StatusCode::BAD_REQUEST,
                format,
                &format!("unsupported interaction {} {}", m, request.url.path()),
            ),
        }
    }

    fn segments(&self, url: &Url) -> Option<Vec<String>> {
        let root = self.base.path().trim_end_matches('/');
        let rest = url.path().strip_prefix(root)?;
        Some(
            rest.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    fn conformance(&self, format: ResourceFormat) -> HttpResponse {
        let mut conformance = Resource::new("Conformance");
        conformance
            .body_mut()
            .set("software", Element::new().with("name", "Mock.Service"))
            .set("fhirVersion", "0.0.82")
            .push("rest", Element::new().with("mode", "server"));
        let mut response = HttpResponse::new(StatusCode::OK);
        response.body = self.codec.encode_resource(&conformance, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.mime_type());
        response
    }

    fn read(
        &self,
        state: &State,
        request: &HttpRequest,
        format: ResourceFormat,
        resource_type: &str,
        id: &str,
        version: Option<u32>,
    ) -> HttpResponse {
        let Some(stored) = state.find(resource_type, id) else {
            return self.outcome(
                StatusCode::NOT_FOUND,
                format,
                &format!("{}/{} does not exist", resource_type, id),
            );
        };
        let version = match version {
            Some(number) => match stored.versions.iter().find(|v| v.number == number) {
                Some(version) => version,
                None => return self.outcome(StatusCode::NOT_FOUND, format, "unknown version"),
            },
            None => stored.latest(),
        };
        let Some(resource) = &version.resource else {
            return self.outcome(
                StatusCode::GONE,
                format,
                &format!("{}/{} was deleted", resource_type, id),
            );
        };

        if let Some(since) = request
            .headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
        {
            if version.updated <= since {
                return HttpResponse::new(StatusCode::NOT_MODIFIED);
            }
        }

        let mut response = HttpResponse::new(StatusCode::OK);
        response.body = self.codec.encode_resource(resource, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.mime_type());
        self.version_headers(&mut response, stored, version, &[CONTENT_LOCATION]);
        response
    }

    fn create(
        &self,
        state: &mut State,
        request: &HttpRequest,
        format: ResourceFormat,
        resource_type: &str,
    ) -> HttpResponse {
        let resource = match self.request_resource(request, resource_type) {
            Ok(resource) => resource,
            Err(message) => return self.outcome(StatusCode::BAD_REQUEST, format, &message),
        };
        let id = state.allocate_id();
        let updated = state.tick();
        state.resources.push(Stored {
            resource_type: resource_type.to_string(),
            id,
            versions: vec![Version {
                number: 1,
                resource: Some(resource),
                tags: parse_category(&request.headers),
                updated,
            }],
        });

        let stored = &state.resources[state.resources.len() - 1];
        let mut response = HttpResponse::new(StatusCode::CREATED);
        self.version_headers(&mut response, stored, stored.latest(), &[LOCATION]);
        response
    }

    fn update(
        &self,
        state: &mut State,
        request: &HttpRequest,
        format: ResourceFormat,
        resource_type: &str,
        id: &str,
    ) -> HttpResponse {
        let resource = match self.request_resource(request, resource_type) {
            Ok(resource) => resource,
            Err(message) => return self.outcome(StatusCode::BAD_REQUEST, format, &message),
        };
        let updated = state.tick();
        let tags = parse_category(&request.headers);

        let status = match state.find_mut(resource_type, id) {
            Some(stored) => {
                let latest = stored.latest();
                if let Some(based_on) = request
                    .headers
                    .get(CONTENT_LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| ResourceIdentity::parse(v).ok())
                {
                    let current = latest.number.to_string();
                    if based_on.version_id() != Some(current.as_str()) {
                        return self.outcome(
                            StatusCode::CONFLICT,
                            format,
                            &format!(
                                "update is based on version {:?}, current version is {}",
                                based_on.version_id(),
                                current
                            ),
                        );
                    }
                }
                let mut merged = latest.tags.clone();
                merge_tags(&mut merged, tags);
                let number = latest.number + 1;
                stored.versions.push(Version {
                    number,
                    resource: Some(resource.clone()),
                    tags: merged,
                    updated,
                });
                StatusCode::OK
            }
            None => {
                state.resources.push(Stored {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                    versions: vec![Version {
                        number: 1,
                        resource: Some(resource.clone()),
                        tags,
                        updated,
                    }],
                });
                StatusCode::CREATED
            }
        };

        let stored = state.find(resource_type, id).unwrap();
        let mut response = HttpResponse::new(status);
        response.body = self.codec.encode_resource(&resource, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.mime_type());
        self.version_headers(&mut response, stored, stored.latest(), &[LOCATION, CONTENT_LOCATION]);
        response
    }

    fn delete(
        &self,
        state: &mut State,
        format: ResourceFormat,
        resource_type: &str,
        id: &str,
    ) -> HttpResponse {
        let updated = state.tick();
        let Some(stored) = state.find_mut(resource_type, id) else {
            return self.outcome(
                StatusCode::NOT_FOUND,
                format,
                &format!("{}/{} does not exist", resource_type, id),
            );
        };
        if !stored.is_deleted() {
            let number = stored.latest().number + 1;
            stored.versions.push(Version {
                number,
                resource: None,
                tags: Vec::new(),
                updated,
            });
        }
        HttpResponse::new(StatusCode::NO_CONTENT)
    }

    #[allow(clippy::too_many_arguments)]
    fn tags(
        &self,
        state: &mut State,
        request: &HttpRequest,
        format: ResourceFormat,
        method: Method,
        resource_type: &str,
        id: &str,
        version: Option<u32>,
    ) -> HttpResponse {
        let Some(stored) = state.find_mut(resource_type, id) else {
            return self.outcome(StatusCode::NOT_FOUND, format, "no such resource");
        };
        if version.is_none() && stored.is_deleted() {
            return self.outcome(StatusCode::GONE, format, "resource was deleted");
        }
        let index = match version {
            Some(number) => match stored.versions.iter().position(|v| v.number == number) {
                Some(index) => index,
                None => return self.outcome(StatusCode::NOT_FOUND, format, "unknown version"),
            },
            None => stored.versions.len() - 1,
        };
        let target = &mut stored.versions[index];

        match method {
            Method::GET => {
                let tags = target.tags.clone();
                self.tag_list(format, tags)
            }
            Method::POST | Method::DELETE => {
                let body_format = request_format(request);
                let body = request.body.as_deref().unwrap_or_default();
                let tags = match self.codec.decode_tags(body, body_format) {
                    Ok(tags) => tags,
                    Err(e) => {
                        return self.outcome(StatusCode::BAD_REQUEST, format, &e.to_string());
                    }
                };
                if method == Method::POST {
                    merge_tags(&mut target.tags, tags);
                } else {
                    remove_tags(&mut target.tags, &tags);
                }
                HttpResponse::new(StatusCode::OK)
            }
            other => self.outcome(
                StatusCode::METHOD_NOT_ALLOWED,
                format,
                &format!("{} is not allowed on tags", other),
            ),
        }
    }

    fn tag_list(&self, format: ResourceFormat, tags: Vec<Tag>) -> HttpResponse {
        let mut response = HttpResponse::new(StatusCode::OK);
        response.body = self.codec.encode_tags(&tags, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.mime_type());
        response
    }

    fn search(
        &self,
        state: &State,
        request: &HttpRequest,
        format: ResourceFormat,
        resource_type: &str,
    ) -> HttpResponse {
        let params: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        let criteria: Vec<&(String, String)> = params
            .iter()
            .filter(|(name, _)| !name.starts_with('_') && name != "page")
            .collect();
        let ids: Vec<&str> = params
            .iter()
            .filter(|(name, _)| name == "_id")
            .map(|(_, value)| value.as_str())
            .collect();

        let matches: Vec<ResourceEnvelope> = state
            .resources
            .iter()
            .filter(|s| s.resource_type == resource_type && !s.is_deleted())
            .filter(|s| ids.is_empty() || ids.contains(&s.id.as_str()))
            .filter(|s| {
                let resource = s.latest().resource.as_ref().unwrap();
                criteria
                    .iter()
                    .all(|(name, value)| field_contains(resource, name, value))
            })
            .map(|s| self.envelope(s, s.latest()))
            .collect();

        let page_size = query_value(&params, "_count")
            .and_then(|c| c.parse::<usize>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let page = query_value(&params, "page")
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let pages = matches.len().div_ceil(page_size).max(1);

        let mut bundle = Bundle::new();
        bundle.title = Some(format!("Search results for resource type {}", resource_type));
        bundle.id = Some(format!("urn:uuid:mock-search-{}", state.requests.len()));
        bundle.updated = Some(state.clock);
        bundle.total_results = Some(matches.len() as u64);
        bundle.links.self_link = Some(page_url(&request.url, page));
        bundle.links.first = Some(page_url(&request.url, 1));
        bundle.links.last = Some(page_url(&request.url, pages));
        if page > 1 {
            bundle.links.previous = Some(page_url(&request.url, page - 1));
        }
        if page < pages {
            bundle.links.next = Some(page_url(&request.url, page + 1));
        }
        bundle.entries = matches
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        self.feed(format, &bundle)
    }

    fn history(
        &self,
        state: &State,
        request: &HttpRequest,
        format: ResourceFormat,
        in_scope: impl Fn(&Stored) -> bool,
    ) -> HttpResponse {
        let params: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        let since = query_value(&params, "_since")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|s| s.with_timezone(&Utc));
        let count = query_value(&params, "_count").and_then(|c| c.parse::<usize>().ok());

        let mut versions: Vec<(&Stored, &Version)> = state
            .resources
            .iter()
            .filter(|s| in_scope(s))
            .flat_map(|s| s.versions.iter().map(move |v| (s, v)))
            .filter(|(_, v)| since.is_none_or(|since| v.updated > since))
            .collect();
        versions.sort_by(|a, b| b.1.updated.cmp(&a.1.updated));
        let total = versions.len();
        if let Some(count) = count {
            versions.truncate(count);
        }

        let mut bundle = Bundle::new();
        bundle.title = Some("History".to_string());
        bundle.id = Some(format!("urn:uuid:mock-history-{}", state.requests.len()));
        bundle.updated = Some(state.clock);
        bundle.total_results = Some(total as u64);
        bundle.links.self_link = Some(request.url.to_string());
        bundle.entries = versions
            .into_iter()
            .map(|(stored, version)| self.envelope(stored, version))
            .collect();
        self.feed(format, &bundle)
    }

    fn feed(&self, format: ResourceFormat, bundle: &Bundle) -> HttpResponse {
        let mut response = HttpResponse::new(StatusCode::OK);
        response.body = self.codec.encode_bundle(bundle, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.feed_mime_type());
        response
    }

    fn envelope(&self, stored: &Stored, version: &Version) -> ResourceEnvelope {
        let id = ResourceIdentity::compose(Some(BASE_URL), &stored.resource_type, &stored.id, None)
            .unwrap();
        let self_link = id.with_version(&version.number.to_string()).unwrap();
        let envelope = match &version.resource {
            Some(resource) => {
                let mut envelope = ResourceEnvelope::new(id, resource.clone());
                envelope.title = Some(format!(
                    "Resource of type {}, with id = {} and version = {}",
                    stored.resource_type, stored.id, version.number
                ));
                envelope.updated = Some(version.updated);
                envelope
            }
            None => ResourceEnvelope::deleted(id, version.updated),
        };
        envelope
            .with_self_link(self_link)
            .with_tags(version.tags.clone())
    }

    fn version_headers(
        &self,
        response: &mut HttpResponse,
        stored: &Stored,
        version: &Version,
        location_headers: &[HeaderName],
    ) {
        let location = format!(
            "{}/{}/{}/_history/{}",
            BASE_URL, stored.resource_type, stored.id, version.number
        );
        for name in location_headers {
            set_header(response, name.clone(), &location);
        }
        set_header(response, LAST_MODIFIED, &format_http_date(&version.updated));
        if !version.tags.is_empty() {
            response
                .headers
                .insert(&CATEGORY, format_category(&version.tags).unwrap());
        }
    }

    fn request_resource(&self, request: &HttpRequest, resource_type: &str) -> Result<Resource, String> {
        let body = request.body.as_deref().unwrap_or_default();
        let resource = self
            .codec
            .decode_resource(body, request_format(request))
            .map_err(|e| e.to_string())?;
        if resource.resource_type() != resource_type {
            return Err(format!(
                "body is a {}, expected a {}",
                resource.resource_type(),
                resource_type
            ));
        }
        Ok(resource)
    }

    fn outcome(&self, status: StatusCode, format: ResourceFormat, message: &str) -> HttpResponse {
        let mut outcome = Resource::new("OperationOutcome");
        outcome.body_mut().push(
            "issue",
            Element::new()
                .with("severity", "error")
                .with("details", message),
        );
        let mut response = HttpResponse::new(status);
        response.body = self.codec.encode_resource(&outcome, format).unwrap();
        set_header(&mut response, CONTENT_TYPE, format.mime_type());
        response
    }
}

impl Transport for MockServer {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });
        Ok(self.handle(&mut state, &request))
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn find(&self, resource_type: &str, id: &str) -> Option<&Stored> {
        self.resources
            .iter()
            .find(|s| s.resource_type == resource_type && s.id == id)
    }

    fn find_mut(&mut self, resource_type: &str, id: &str) -> Option<&mut Stored> {
        self.resources
            .iter_mut()
            .find(|s| s.resource_type == resource_type && s.id == id)
    }

    fn tags_in_use(&self, resource_type: Option<&str>) -> Vec<Tag> {
        let mut tags = Vec::new();
        for stored in &self.resources {
            if resource_type.is_some_and(|t| t != stored.resource_type) {
                continue;
            }
            for version in &stored.versions {
                merge_tags(&mut tags, version.tags.iter().cloned());
            }
        }
        tags
    }
}

/// A transport whose server is never reachable.
pub struct UnreachableTransport;

impl Transport for UnreachableTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Connect(format!(
            "connection refused: {}",
            request.url.host_str().unwrap_or_default()
        )))
    }
}

fn set_header(response: &mut HttpResponse, name: HeaderName, value: &str) {
    response
        .headers
        .insert(name, HeaderValue::from_str(value).unwrap());
}

fn query_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// The format the client asked for: `_format` first, then `Accept`.
fn response_format(request: &HttpRequest) -> ResourceFormat {
    request
        .url
        .query_pairs()
        .find(|(name, _)| name == "_format")
        .and_then(|(_, value)| ResourceFormat::from_format_param(&value))
        .or_else(|| {
            request
                .headers
                .get(ACCEPT)
                .and_then(|v| v.to_str().ok())
                .and_then(ResourceFormat::parse)
        })
        .unwrap_or_default()
}

/// The format of the request body.
fn request_format(request: &HttpRequest) -> ResourceFormat {
    request
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ResourceFormat::parse)
        .unwrap_or_else(|| response_format(request))
}

fn page_url(url: &Url, page: usize) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(name, _)| name != "page")
        .collect();
    let mut page_url = url.clone();
    page_url.set_query(None);
    page_url
        .query_pairs_mut()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    page_url.to_string()
}

/// Case-insensitive substring match over every primitive under field `name`.
fn field_contains(resource: &Resource, name: &str, value: &str) -> bool {
    let needle = value.to_lowercase();
    resource
        .body()
        .get_all(name)
        .iter()
        .any(|v| value_contains(v, &needle))
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::Primitive(primitive) => primitive
            .value
            .as_ref()
            .is_some_and(|v| v.to_lexical().to_lowercase().contains(needle)),
        Value::Complex(element) => element
            .iter()
            .any(|(_, field)| field.values().iter().any(|v| value_contains(v, needle))),
        _ => false,
    }
}
