//! Submission context.
//!
//! The context is an opaque key/value snapshot captured when a business
//! object is submitted for approval. The engine itself only interprets two
//! shapes of value: strings (for field scoping and role filtering) and the
//! monetary `amount` (for thresholds and functional-domain limits).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Context key carrying the monetary amount of the submitted object.
pub const AMOUNT_FIELD: &str = "amount";

/// Opaque context snapshot attached to a workflow instance at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalContext(BTreeMap<String, serde_json::Value>);

impl ApprovalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, consuming and returning self for builder-style use.
    pub fn with<V: Into<serde_json::Value>>(mut self, key: impl Into<String>, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// String view of a field. Non-string values are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// The monetary amount, when present and numeric.
    pub fn amount(&self) -> Option<f64> {
        self.0.get(AMOUNT_FIELD).and_then(serde_json::Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, serde_json::Value)> for ApprovalContext {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
