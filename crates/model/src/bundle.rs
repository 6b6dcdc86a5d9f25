//! Envelopes (entries) and bundles (feeds).

use chrono::{DateTime, Utc};

use crate::identity::ResourceIdentity;
use crate::resource::Resource;
use crate::tag::Tag;

/// A resource together with its protocol metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEnvelope {
    /// Unversioned identity of the resource.
    pub id: ResourceIdentity,
    /// Identity of this specific version.
    pub self_link: Option<ResourceIdentity>,
    /// Entry title, as given by the server.
    pub title: Option<String>,
    /// When this version was last updated.
    pub updated: Option<DateTime<Utc>>,
    /// Tags on this version.
    pub tags: Vec<Tag>,
    /// The resource, or the tombstone of a deleted one.
    pub content: EnvelopeContent,
}

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeContent {
    /// A live resource.
    Resource(Resource),
    /// A deletion; carries no resource body.
    Deleted {
        /// When the resource was deleted.
        when: DateTime<Utc>,
    },
}

impl ResourceEnvelope {
    /// Creates an envelope around a live resource.
    pub fn new(id: ResourceIdentity, resource: Resource) -> Self {
        Self {
            id,
            self_link: None,
            title: None,
            updated: None,
            tags: Vec::new(),
            content: EnvelopeContent::Resource(resource),
        }
    }

    /// Creates a tombstone entry.
    pub fn deleted(id: ResourceIdentity, when: DateTime<Utc>) -> Self {
        Self {
            id,
            self_link: None,
            title: None,
            updated: None,
            tags: Vec::new(),
            content: EnvelopeContent::Deleted { when },
        }
    }

    /// Sets the self link.
    pub fn with_self_link(mut self, self_link: ResourceIdentity) -> Self {
        self.self_link = Some(self_link);
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// The resource, unless this is a tombstone.
    pub fn resource(&self) -> Option<&Resource> {
        match &self.content {
            EnvelopeContent::Resource(resource) => Some(resource),
            EnvelopeContent::Deleted { .. } => None,
        }
    }

    /// Mutable access to the resource, unless this is a tombstone.
    pub fn resource_mut(&mut self) -> Option<&mut Resource> {
        match &mut self.content {
            EnvelopeContent::Resource(resource) => Some(resource),
            EnvelopeContent::Deleted { .. } => None,
        }
    }

    /// Returns true for a tombstone.
    pub fn is_deleted(&self) -> bool {
        matches!(self.content, EnvelopeContent::Deleted { .. })
    }

    /// Resource type of the entry, taken from its identity.
    pub fn resource_type(&self) -> &str {
        self.id.resource_type()
    }

    /// Version id of this entry, from the self link.
    pub fn version_id(&self) -> Option<&str> {
        self.self_link
            .as_ref()
            .and_then(ResourceIdentity::version_id)
            .or_else(|| self.id.version_id())
    }
}

/// Navigation links of a bundle. All present links are absolute urls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleLinks {
    /// Link to this page.
    pub self_link: Option<String>,
    /// Link to the first page.
    pub first: Option<String>,
    /// Link to the previous page.
    pub previous: Option<String>,
    /// Link to the next page.
    pub next: Option<String>,
    /// Link to the last page.
    pub last: Option<String>,
}

impl BundleLinks {
    /// Returns true for the relations a bundle keeps: `self` and the page links.
    pub fn is_navigation(rel: &str) -> bool {
        matches!(rel, "self" | "first" | "previous" | "prev" | "next" | "last")
    }

    /// Returns the link for a relation name (`self`, `first`, `previous`, `next`, `last`).
    pub fn get(&self, rel: &str) -> Option<&str> {
        match rel {
            "self" => self.self_link.as_deref(),
            "first" => self.first.as_deref(),
            "previous" | "prev" => self.previous.as_deref(),
            "next" => self.next.as_deref(),
            "last" => self.last.as_deref(),
            _ => None,
        }
    }

    /// Sets the link for a relation name. Unknown relations are ignored and reported.
    pub fn set(&mut self, rel: &str, href: impl Into<String>) -> bool {
        let slot = match rel {
            "self" => &mut self.self_link,
            "first" => &mut self.first,
            "previous" | "prev" => &mut self.previous,
            "next" => &mut self.next,
            "last" => &mut self.last,
            _ => return false,
        };
        *slot = Some(href.into());
        true
    }

    /// Iterates over present links as `(rel, href)` in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("self", &self.self_link),
            ("first", &self.first),
            ("previous", &self.previous),
            ("next", &self.next),
            ("last", &self.last),
        ]
        .into_iter()
        .filter_map(|(rel, href)| href.as_deref().map(|h| (rel, h)))
    }
}

/// An ordered collection of entries plus navigation metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    /// Feed title.
    pub title: Option<String>,
    /// Feed id (usually a `urn:uuid:`).
    pub id: Option<String>,
    /// When the feed was produced.
    pub updated: Option<DateTime<Utc>>,
    /// Navigation links.
    pub links: BundleLinks,
    /// Total number of matches across all pages, if the server reported it.
    pub total_results: Option<u64>,
    /// Feed level tags.
    pub tags: Vec<Tag>,
    /// Entries in server order.
    pub entries: Vec<ResourceEnvelope>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries on this page.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the page has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose identity has the given resource type.
    pub fn entries_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ResourceEnvelope> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.resource_type() == resource_type)
    }

    /// Live (non deleted) entries.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceEnvelope> {
        self.entries.iter().filter(|e| !e.is_deleted())
    }
}
