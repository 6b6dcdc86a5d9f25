//! Field validation rules.
//!
//! Each rule is keyed by the role a field plays (an id, a resource type name)
//! and checked explicitly by the code that builds identities or resolves
//! factories.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// Grammar for logical ids and version ids.
pub const ID_PATTERN: &str = r"[A-Za-z0-9\-\.]{1,36}";

/// Grammar for resource type names (`Patient`, `DiagnosticReport`).
pub const RESOURCE_NAME_PATTERN: &str = r"[A-Z][A-Za-z0-9]*";

static ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{}$", ID_PATTERN)).expect("ID_PATTERN is a valid regex")
});

static RESOURCE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{}$", RESOURCE_NAME_PATTERN))
        .expect("RESOURCE_NAME_PATTERN is a valid regex")
});

/// The role a validated field plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRule {
    /// Logical id or version id of a resource.
    Id,
    /// Resource type token.
    ResourceName,
}

impl FieldRule {
    /// Returns the regular expression (without anchors) enforced by this rule.
    pub fn pattern(&self) -> &'static str {
        match self {
            FieldRule::Id => ID_PATTERN,
            FieldRule::ResourceName => RESOURCE_NAME_PATTERN,
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            FieldRule::Id => &ID_REGEX,
            FieldRule::ResourceName => &RESOURCE_NAME_REGEX,
        }
    }
}

impl fmt::Display for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::Id => write!(f, "id pattern"),
            FieldRule::ResourceName => write!(f, "resource name"),
        }
    }
}

/// Validates `value` against the rule for its field role.
pub fn validate(rule: FieldRule, value: &str) -> Result<(), ValidationError> {
    if rule.regex().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            rule,
            value: value.to_string(),
        })
    }
}

/// Returns true when `value` is a correctly formatted id.
pub fn is_valid_id(value: &str) -> bool {
    validate(FieldRule::Id, value).is_ok()
}

/// Returns true when `value` is a resource type name.
pub fn is_resource_name(value: &str) -> bool {
    validate(FieldRule::ResourceName, value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_id("1"));
        assert!(is_valid_id("45qq54"));
        assert!(is_valid_id("a-b.c"));
        assert!(is_valid_id("ABC123"));
        assert!(is_valid_id(&"x".repeat(36)));
    }

    #[test]
    fn test_invalid_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(&"x".repeat(37)));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("a b"));
        assert!(!is_valid_id("a_b"));
        assert!(!is_valid_id("1\n"));
    }

    #[test]
    fn test_validate_reports_rule() {
        let err = validate(FieldRule::Id, "no spaces").unwrap_err();
        assert_eq!(err.rule, FieldRule::Id);
        assert_eq!(err.value, "no spaces");
    }

    #[test]
    fn test_resource_names() {
        assert!(is_resource_name("Patient"));
        assert!(is_resource_name("DiagnosticReport"));
        assert!(!is_resource_name("patient"));
        assert!(!is_resource_name("_history"));
        assert!(!is_resource_name(""));
    }
}
