//! Partial record merger
//!
//! Folds the per-tool [`PartialRecord`]s of one lookup into a single
//! [`AggregatedRecord`].
//!
//! # Merge rules
//! - Scalars (`basic.*`, `carrier`, `country`) are first-write-wins in the
//!   order the partials are given
//! - Metadata keys are first-write-wins too; later sources only add new keys
//! - Profiles are keyed by normalized URL, leaks by `site` + `exists`; each
//!   key accumulates the distinct sources that reported it
//! - Two or more distinct sources make an item `high` confidence, one makes
//!   it `medium`
//! - Output lists keep the order of first appearance
//!
//! The merge is pure: the same partials in the same order always produce the
//! same record.

use crate::parsers::text::normalize_url;
use osint_common::record::{LeakFinding, ProfileEntry};
use osint_common::{AggregatedRecord, Confidence, LeakEntry, PartialRecord, Query, QueryType};
use serde_json::Value;
use std::collections::HashMap;

/// Query a merge is performed for
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub query: &'a str,
    pub query_type: QueryType,
}

impl<'a> From<&'a Query> for MergeContext<'a> {
    fn from(query: &'a Query) -> Self {
        Self {
            query: &query.raw_value,
            query_type: query.query_type,
        }
    }
}

/// Items deduplicated by key, remembering first-appearance order
struct Provenance<K, V> {
    index: HashMap<K, usize>,
    items: Vec<(V, Vec<String>)>,
}

impl<K: std::hash::Hash + Eq, V> Provenance<K, V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn add(&mut self, key: K, value: impl FnOnce() -> V, source: &str) {
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.items.push((value(), Vec::new()));
                self.index.insert(key, self.items.len() - 1);
                self.items.len() - 1
            }
        };
        let sources = &mut self.items[slot].1;
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }

    fn into_items(self) -> impl Iterator<Item = (V, Vec<String>, Confidence)> {
        self.items.into_iter().map(|(value, sources)| {
            let confidence = Confidence::from_source_count(sources.len());
            (value, sources, confidence)
        })
    }
}

/// Merge `partials` into one record for `context`
pub fn merge(context: MergeContext<'_>, partials: &[PartialRecord]) -> AggregatedRecord {
    let mut record = AggregatedRecord::empty(context.query, context.query_type);
    let mut profiles: Provenance<String, String> = Provenance::new();
    let mut leaks: Provenance<LeakEntry, LeakEntry> = Provenance::new();

    for partial in partials {
        for (key, value) in &partial.basic {
            record
                .basic
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if record.carrier.is_none() {
            record.carrier = non_blank(partial.carrier.as_deref());
        }
        if record.country.is_none() {
            record.country = non_blank(partial.country.as_deref());
        }

        for raw in &partial.social_profiles {
            // Anything without a URL in it is not a profile
            if let Some(url) = normalize_url(raw) {
                let shown = url.clone();
                profiles.add(url, || shown, &partial.source);
            }
        }

        for leak in &partial.leaks {
            if leak.site.trim().is_empty() {
                continue;
            }
            leaks.add(leak.clone(), || leak.clone(), &partial.source);
        }

        for (key, value) in &partial.metadata {
            if !record.metadata.contains_key(key) {
                record.metadata.insert(key.clone(), value.clone());
            }
        }
    }

    record.social_profiles = profiles
        .into_items()
        .map(|(url, sources, confidence)| ProfileEntry {
            url,
            sources,
            confidence,
        })
        .collect();

    record.leaks = leaks
        .into_items()
        .map(|(leak, sources, confidence)| LeakFinding {
            site: leak.site,
            exists: leak.exists,
            sources,
            confidence,
        })
        .collect();

    backfill(&mut record);
    record
}

/// Fill carrier/country left empty by the partials from metadata, then basic
fn backfill(record: &mut AggregatedRecord) {
    if record.carrier.is_none() {
        record.carrier = metadata_string(record, "carrier");
    }
    if record.country.is_none() {
        record.country = metadata_string(record, "country").or_else(|| {
            record
                .basic
                .get("country")
                .and_then(|v| non_blank(v.as_text()))
        });
    }
}

fn metadata_string(record: &AggregatedRecord, key: &str) -> Option<String> {
    record
        .metadata
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| non_blank(Some(s)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use osint_common::record::FieldValue;
    use serde_json::json;

    fn ctx() -> MergeContext<'static> {
        MergeContext {
            query: "johndoe",
            query_type: QueryType::Username,
        }
    }

    #[test]
    fn test_empty_merge() {
        let record = merge(ctx(), &[]);
        assert_eq!(record, AggregatedRecord::empty("johndoe", QueryType::Username));
    }

    #[test]
    fn test_first_write_wins_for_scalars() {
        let a = PartialRecord::new("a")
            .with_basic("name", "Alice")
            .with_carrier("Verizon");
        let b = PartialRecord::new("b")
            .with_basic("name", "Bob")
            .with_basic("email", "bob@example.com")
            .with_carrier("AT&T")
            .with_country("US");

        let record = merge(ctx(), &[a, b]);
        assert_eq!(record.basic.get("name"), Some(&FieldValue::from("Alice")));
        assert_eq!(
            record.basic.get("email"),
            Some(&FieldValue::from("bob@example.com"))
        );
        assert_eq!(record.carrier.as_deref(), Some("Verizon"));
        assert_eq!(record.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_profiles_dedup_by_normalized_url() {
        let a = PartialRecord::new("sherlock").with_profile("[+] GitHub: https://github.com/johndoe");
        let b = PartialRecord::new("maigret")
            .with_profile("http://github.com/johndoe")
            .with_profile("https://gitlab.com/johndoe");

        let record = merge(ctx(), &[a, b]);
        assert_eq!(record.social_profiles.len(), 2);

        let github = &record.social_profiles[0];
        assert_eq!(github.url, "https://github.com/johndoe");
        assert_eq!(github.sources, vec!["sherlock", "maigret"]);
        assert_eq!(github.confidence, Confidence::High);

        let gitlab = &record.social_profiles[1];
        assert_eq!(gitlab.sources, vec!["maigret"]);
        assert_eq!(gitlab.confidence, Confidence::Medium);
    }

    #[test]
    fn test_same_source_twice_is_not_corroboration() {
        let a = PartialRecord::new("sherlock")
            .with_profile("https://x.com/a")
            .with_profile("http://x.com/a");
        let record = merge(ctx(), &[a]);
        assert_eq!(record.social_profiles.len(), 1);
        assert_eq!(record.social_profiles[0].sources, vec!["sherlock"]);
        assert_eq!(record.social_profiles[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_leaks_keyed_by_site_and_exists() {
        let a = PartialRecord::new("holehe")
            .with_leak(LeakEntry::found("netflix"))
            .with_leak(LeakEntry {
                site: "spotify".to_string(),
                exists: false,
            });
        let b = PartialRecord::new("ghunt")
            .with_leak(LeakEntry::found("netflix"))
            .with_leak(LeakEntry::found("spotify"));

        let record = merge(ctx(), &[a, b]);
        assert_eq!(record.leaks.len(), 3);
        assert_eq!(record.leaks[0].site, "netflix");
        assert_eq!(record.leaks[0].sources.len(), 2);
        assert_eq!(record.leaks[0].confidence, Confidence::High);
        assert!(!record.leaks[1].exists);
        assert_eq!(record.leaks[2].confidence, Confidence::Medium);
    }

    #[test]
    fn test_metadata_keys_first_write_wins() {
        let a = PartialRecord::new("a").with_metadata("ghunt", json!({"v": 1}));
        let b = PartialRecord::new("b")
            .with_metadata("ghunt", json!({"v": 2}))
            .with_metadata("phoneinfoga", json!({"raw_output": []}));

        let record = merge(ctx(), &[a, b]);
        assert_eq!(record.metadata["ghunt"], json!({"v": 1}));
        assert!(record.metadata.contains_key("phoneinfoga"));
    }

    #[test]
    fn test_backfill_from_metadata_then_basic() {
        let a = PartialRecord::new("a")
            .with_metadata("carrier", json!("T-Mobile"))
            .with_basic("country", "Canada");
        let record = merge(ctx(), &[a]);
        assert_eq!(record.carrier.as_deref(), Some("T-Mobile"));
        assert_eq!(record.country.as_deref(), Some("Canada"));

        let b = PartialRecord::new("b")
            .with_country("US")
            .with_metadata("country", json!("Mexico"));
        let record = merge(ctx(), &[b]);
        assert_eq!(record.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let a = PartialRecord::new("a")
            .with_carrier("  ")
            .with_profile("no url on this line")
            .with_leak(LeakEntry::found(""));
        let b = PartialRecord::new("b").with_carrier("Verizon");

        let record = merge(ctx(), &[a, b]);
        assert_eq!(record.carrier.as_deref(), Some("Verizon"));
        assert!(record.social_profiles.is_empty());
        assert!(record.leaks.is_empty());
    }

    #[test]
    fn test_merge_from_query() {
        let query = Query::parse("test@example.com").unwrap();
        let record = merge(MergeContext::from(&query), &[]);
        assert_eq!(record.query, "test@example.com");
        assert_eq!(record.query_type, QueryType::Email);
    }
}
