//! Resource identity: the canonical locator of a resource.
//!
//! A resource is addressed as `[base/]Type/id[/_history/version]`, for example
//! `http://spark.furore.com/fhir/Location/1/_history/3`. The base is optional so
//! relative references (`Patient/12`) are identities too.
//!
//! Parsing keeps the base exactly as written, which makes
//! `ResourceIdentity::parse(s)?.to_url() == s` hold for every well-formed `s`.

use std::fmt;
use std::str::FromStr;

use crate::error::IdentityError;
use crate::validation::{self, FieldRule};

/// Path segment that introduces a version id.
pub const HISTORY_SEGMENT: &str = "_history";

/// An immutable, validated resource locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    base: Option<String>,
    resource_type: String,
    id: String,
    version_id: Option<String>,
}

impl ResourceIdentity {
    /// Parses a locator into its parts.
    ///
    /// # Errors
    ///
    /// * [`IdentityError::Malformed`] when the path has no `Type/id` pair, has
    ///   empty segments, a query or fragment, or a dangling `_history` segment.
    /// * [`IdentityError::InvalidIdentifier`] when the id or version id does not
    ///   match the id grammar.
    pub fn parse(url: &str) -> Result<Self, IdentityError> {
        if url.contains(['?', '#']) {
            return Err(IdentityError::malformed(
                url,
                "query and fragment are not part of an identity",
            ));
        }

        // Everything up to the authority belongs to the base, whatever it contains.
        let path_start = match url.find("://") {
            Some(scheme_end) => {
                let authority_start = scheme_end + 3;
                match url[authority_start..].find('/') {
                    Some(slash) => authority_start + slash + 1,
                    None => {
                        return Err(IdentityError::malformed(url, "no path after the authority"));
                    }
                }
            }
            None => 0,
        };

        let path = &url[path_start..];
        let segments: Vec<(usize, &str)> = path
            .split('/')
            .scan(path_start, |offset, segment| {
                let start = *offset;
                *offset += segment.len() + 1;
                Some((start, segment))
            })
            .collect();

        if segments.iter().any(|(_, s)| s.is_empty()) {
            return Err(IdentityError::malformed(url, "empty path segment"));
        }

        let (type_index, version_id) =
            match segments.iter().position(|(_, s)| *s == HISTORY_SEGMENT) {
                Some(history) => {
                    if history + 2 != segments.len() {
                        return Err(IdentityError::malformed(
                            url,
                            "_history must be followed by exactly one version segment",
                        ));
                    }
                    if history < 2 {
                        return Err(IdentityError::malformed(
                            url,
                            "_history must follow a type and id segment",
                        ));
                    }
                    (history - 2, Some(segments[history + 1].1))
                }
                None => {
                    if segments.len() < 2 {
                        return Err(IdentityError::malformed(
                            url,
                            "expected at least a type and an id segment",
                        ));
                    }
                    (segments.len() - 2, None)
                }
            };

        let (type_offset, resource_type) = segments[type_index];
        let id = segments[type_index + 1].1;

        if !validation::is_resource_name(resource_type) {
            return Err(IdentityError::malformed(
                url,
                format!("'{}' is not a resource type name", resource_type),
            ));
        }
        validation::validate(FieldRule::Id, id)?;
        if let Some(version) = version_id {
            validation::validate(FieldRule::Id, version)?;
        }

        let base = if type_offset == 0 {
            None
        } else {
            Some(url[..type_offset - 1].to_string())
        };

        Ok(Self {
            base,
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id: version_id.map(str::to_string),
        })
    }

    /// Builds an identity from its parts, validating each of them.
    ///
    /// A trailing `/` on the base is dropped.
    pub fn compose(
        base: Option<&str>,
        resource_type: &str,
        id: &str,
        version_id: Option<&str>,
    ) -> Result<Self, IdentityError> {
        validation::validate(FieldRule::ResourceName, resource_type)?;
        validation::validate(FieldRule::Id, id)?;
        if let Some(version) = version_id {
            validation::validate(FieldRule::Id, version)?;
        }

        let base = match base.map(|b| b.trim_end_matches('/')) {
            Some("") | None => None,
            Some(b) if b.contains(['?', '#']) => {
                return Err(IdentityError::malformed(
                    b,
                    "base url cannot carry a query or fragment",
                ));
            }
            Some(b) => Some(b.to_string()),
        };

        Ok(Self {
            base,
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id: version_id.map(str::to_string),
        })
    }

    /// Base url (service root), if the identity is absolute.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Resource type name.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version id, present only for a specific historical version.
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// Returns true when the identity has no base url.
    pub fn is_relative(&self) -> bool {
        self.base.is_none()
    }

    /// Returns true when the identity points at a specific version.
    pub fn is_versioned(&self) -> bool {
        self.version_id.is_some()
    }

    /// Returns a copy pointing at the given version.
    pub fn with_version(&self, version_id: &str) -> Result<Self, IdentityError> {
        validation::validate(FieldRule::Id, version_id)?;
        Ok(Self {
            version_id: Some(version_id.to_string()),
            ..self.clone()
        })
    }

    /// Returns a copy without the version component.
    pub fn without_version(&self) -> Self {
        Self {
            version_id: None,
            ..self.clone()
        }
    }

    /// Returns a copy resolved against `base`. Absolute identities keep their own base.
    pub fn with_base(&self, base: &str) -> Self {
        if self.base.is_some() {
            return self.clone();
        }
        let trimmed = base.trim_end_matches('/');
        Self {
            base: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..self.clone()
        }
    }

    /// Renders the identity exactly as held, including the version when present.
    pub fn to_url(&self) -> String {
        match &self.version_id {
            Some(version) => format!(
                "{}/{}/{}",
                self.to_unversioned_url(),
                HISTORY_SEGMENT,
                version
            ),
            None => self.to_unversioned_url(),
        }
    }

    /// Renders `[base/]Type/id`.
    pub fn to_unversioned_url(&self) -> String {
        match &self.base {
            Some(base) => format!("{}/{}/{}", base, self.resource_type, self.id),
            None => format!("{}/{}", self.resource_type, self.id),
        }
    }

    /// Renders `[base/]Type/id/_history/version`, or `None` without a version.
    pub fn to_versioned_url(&self) -> Option<String> {
        self.version_id.as_ref().map(|_| self.to_url())
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

impl FromStr for ResourceIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ResourceIdentity {
    type Error = IdentityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
