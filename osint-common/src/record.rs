//! Record value types
//!
//! A [`PartialRecord`] is the normalized contribution of one tool for one
//! query. The merger folds any number of them into a single
//! [`AggregatedRecord`], whose JSON shape is the wire contract consumed by the
//! frontend:
//!
//! ```json
//! {
//!   "query": "...", "type": "email",
//!   "basic": {},
//!   "socialProfiles": [{"url": "...", "sources": ["sherlock"], "confidence": "medium"}],
//!   "leaks": [{"site": "...", "exists": true, "sources": ["holehe"], "confidence": "medium"}],
//!   "carrier": null, "country": null,
//!   "metadata": {}
//! }
//! ```

use crate::query::QueryType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Scalar value of a basic field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Flag(_) => None,
        }
    }
}

/// Account-existence finding for one site
///
/// `site` + `exists` is the identity key used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeakEntry {
    pub site: String,
    pub exists: bool,
}

impl LeakEntry {
    pub fn found(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            exists: true,
        }
    }
}

/// Normalized output of one tool for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    /// Tool that produced this record (provenance tag)
    pub source: String,
    pub basic: BTreeMap<String, FieldValue>,
    pub social_profiles: Vec<String>,
    pub leaks: Vec<LeakEntry>,
    pub carrier: Option<String>,
    pub country: Option<String>,
    /// Opaque passthrough bucket, merged shallowly
    pub metadata: Map<String, Value>,
}

impl PartialRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            basic: BTreeMap::new(),
            social_profiles: Vec::new(),
            leaks: Vec::new(),
            carrier: None,
            country: None,
            metadata: Map::new(),
        }
    }

    /// Set a basic field, ignoring blank text
    pub fn set_basic(&mut self, key: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if let FieldValue::Text(ref s) = value {
            if s.trim().is_empty() {
                return;
            }
        }
        self.basic.insert(key.to_string(), value);
    }

    pub fn with_basic(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set_basic(key, value);
        self
    }

    pub fn with_profile(mut self, url: impl Into<String>) -> Self {
        self.social_profiles.push(url.into());
        self
    }

    pub fn with_leak(mut self, leak: LeakEntry) -> Self {
        self.leaks.push(leak);
        self
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// True when the record would contribute nothing to a merge
    pub fn is_empty(&self) -> bool {
        self.basic.is_empty()
            && self.social_profiles.is_empty()
            && self.leaks.is_empty()
            && self.carrier.is_none()
            && self.country.is_none()
            && self.metadata.is_empty()
    }
}

/// Corroboration tier of a merged item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Two or more distinct sources reported the item
    High,
    /// Exactly one source reported the item
    Medium,
}

impl Confidence {
    pub fn from_source_count(count: usize) -> Self {
        if count >= 2 {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}

/// Merged social profile with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub url: String,
    pub sources: Vec<String>,
    pub confidence: Confidence,
}

/// Merged leak finding with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakFinding {
    pub site: String,
    pub exists: bool,
    pub sources: Vec<String>,
    pub confidence: Confidence,
}

/// Final merged result for one lookup request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub query: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub basic: BTreeMap<String, FieldValue>,
    pub social_profiles: Vec<ProfileEntry>,
    pub leaks: Vec<LeakFinding>,
    pub carrier: Option<String>,
    pub country: Option<String>,
    pub metadata: Map<String, Value>,
}

impl AggregatedRecord {
    /// Record with no findings
    pub fn empty(query: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query: query.into(),
            query_type,
            basic: BTreeMap::new(),
            social_profiles: Vec::new(),
            leaks: Vec::new(),
            carrier: None,
            country: None,
            metadata: Map::new(),
        }
    }
}
