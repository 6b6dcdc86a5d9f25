//! Tags: metadata triples that can be affixed to resources.

use std::hash::{Hash, Hasher};

/// Scheme for general purpose tags.
pub const FHIR_TAG_SCHEME_GENERAL: &str = "http://hl7.org/fhir/tag";

/// Scheme for profile tags.
pub const FHIR_TAG_SCHEME_PROFILE: &str = "http://hl7.org/fhir/tag/profile";

/// Scheme for security labels.
pub const FHIR_TAG_SCHEME_SECURITY: &str = "http://hl7.org/fhir/tag/security";

/// A `{scheme, term, label}` triple.
///
/// Two tags are equal when scheme and term match; the label is descriptive only.
#[derive(Debug, Clone, Eq)]
pub struct Tag {
    /// Uri identifying the tag.
    pub term: String,
    /// Tag scheme (general, profile, security or a custom scheme).
    pub scheme: String,
    /// Human readable label.
    pub label: Option<String>,
}

impl Tag {
    /// Creates a tag with a label.
    pub fn new(term: impl Into<String>, scheme: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            scheme: scheme.into(),
            label: Some(label.into()),
        }
    }

    /// Creates a tag in the general scheme without a label.
    pub fn general(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            scheme: FHIR_TAG_SCHEME_GENERAL.to_string(),
            label: None,
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.term == other.term
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.term.hash(state);
    }
}

/// Adds each tag of `extra` to `tags` unless an equal tag is already present.
///
/// Order of first appearance is kept.
pub fn merge_tags(tags: &mut Vec<Tag>, extra: impl IntoIterator<Item = Tag>) {
    for tag in extra {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
}

/// Removes every tag equal to one in `remove`.
pub fn remove_tags(tags: &mut Vec<Tag>, remove: &[Tag]) {
    tags.retain(|t| !remove.contains(t));
}
