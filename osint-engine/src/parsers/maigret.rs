//! Maigret: JSON / NDJSON reports when present, otherwise found-URL lines

use super::text::{drop_status_lines, first_str, normalize_url, parse_json, parse_ndjson, strip_noise, url_lines};
use super::SideChannel;
use crate::tools::ToolOutput;
use osint_common::PartialRecord;
use serde_json::Value;

const STATUS_MARKERS: &[&str] = &["[-]", "[!]", "[*]"];

pub fn parse(output: &ToolOutput, _side: &SideChannel) -> Option<PartialRecord> {
    let clean = drop_status_lines(&strip_noise(&output.stdout), STATUS_MARKERS);

    let mut urls: Vec<String> = parse_ndjson(&clean).iter().flat_map(site_urls).collect();
    if urls.is_empty() {
        if let Some(doc) = parse_json(&clean) {
            urls = site_urls(&doc);
        }
    }
    if urls.is_empty() {
        urls = url_lines(&clean);
    }
    if urls.is_empty() {
        return None;
    }

    let mut record = PartialRecord::new("maigret");
    record.social_profiles = urls;
    Some(record)
}

/// `sites.<name>.url` of one report document
fn site_urls(doc: &Value) -> Vec<String> {
    let Some(sites) = doc.get("sites").and_then(Value::as_object) else {
        return Vec::new();
    };
    sites
        .values()
        .filter_map(|site| first_str(site, &["url_user", "url"]))
        .filter_map(normalize_url)
        .collect()
}
