//! Policy field scoping.
//!
//! A `FieldScope` describes which values of a context field a policy applies
//! to: either every value (`Global`) or an explicit permitted set
//! (`Specific`). The two cases are a tagged union rather than a nullable
//! collection, so "applies everywhere" can never be confused with "applies
//! nowhere" (an intentionally inert `Specific` with an empty set).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// GLOBAL-or-SPECIFIC restriction over one context field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "values", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldScope {
    /// The owning policy applies regardless of this field's value.
    Global,
    /// The policy is restricted to this value set. An empty set matches
    /// nothing, which is a valid configuration, not an error.
    Specific(BTreeSet<String>),
}

impl FieldScope {
    /// Build a `Specific` scope from anything iterable.
    pub fn specific<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Specific(values.into_iter().map(Into::into).collect())
    }

    /// Whether a candidate value falls inside this scope.
    ///
    /// A missing candidate only matches `Global`: a policy that restricts a
    /// field cannot match an object that does not carry the field at all.
    pub fn matches(&self, candidate: Option<&str>) -> bool {
        match self {
            Self::Global => true,
            Self::Specific(values) => candidate.is_some_and(|v| values.contains(v)),
        }
    }

    /// Whether this scope can never match anything.
    pub fn is_inert(&self) -> bool {
        matches!(self, Self::Specific(values) if values.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_matches_anything() {
        let scope = FieldScope::Global;
        assert!(scope.matches(Some("CIVIL")));
        assert!(scope.matches(None));
        assert!(!scope.is_inert());
    }

    #[test]
    fn test_specific_matches_members_only() {
        let scope = FieldScope::specific(["CIVIL", "MEP"]);
        assert!(scope.matches(Some("CIVIL")));
        assert!(scope.matches(Some("MEP")));
        assert!(!scope.matches(Some("STRUCTURAL")));
        assert!(!scope.matches(None));
    }

    #[test]
    fn test_empty_specific_is_inert_not_global() {
        let scope = FieldScope::specific(Vec::<String>::new());
        assert!(scope.is_inert());
        assert!(!scope.matches(Some("CIVIL")));
        assert!(!scope.matches(None));
    }

    #[test]
    fn test_serde_distinguishes_global_from_empty_set() {
        let global = serde_json::to_value(FieldScope::Global).unwrap();
        let empty = serde_json::to_value(FieldScope::specific(Vec::<String>::new())).unwrap();
        assert_eq!(global["mode"], "GLOBAL");
        assert_eq!(empty["mode"], "SPECIFIC");
        assert_ne!(global, empty);

        let back: FieldScope = serde_json::from_value(empty).unwrap();
        assert!(back.is_inert());
    }
}
