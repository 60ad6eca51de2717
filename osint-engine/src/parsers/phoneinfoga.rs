//! PhoneInfoga: number formats, country, carrier and line type
//!
//! JSON output is used when the tool emits it. The text report is read with
//! label matching per line, then a looser pass over the whole text when the
//! line pass found neither carrier nor country.

use super::text::{first_str, is_truthy, labeled_value, loose_value, parse_json, strip_noise};
use super::SideChannel;
use crate::tools::ToolOutput;
use once_cell::sync::Lazy;
use osint_common::PartialRecord;
use regex::Regex;
use serde_json::{json, Value};

static PHONE_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s+\-()]+$").expect("valid phone value regex"));

const CARRIER_LABELS: &[&str] = &["carrier", "network", "provider"];
const COUNTRY_LABELS: &[&str] = &["country", "region", "nation"];
const TYPE_LABELS: &[&str] = &["line type", "linetype", "type"];

pub fn parse(output: &ToolOutput, _side: &SideChannel) -> Option<PartialRecord> {
    let clean = strip_noise(&output.stdout);
    if clean.trim().is_empty() {
        return None;
    }

    match parse_json(&clean) {
        Some(doc) if doc.is_object() => Some(from_json(doc)),
        _ => Some(from_text(&clean)),
    }
}

fn from_json(doc: Value) -> PartialRecord {
    let mut record = PartialRecord::new("phoneinfoga");

    if let Some(number) = first_str(&doc, &["number", "input"]) {
        record.set_basic("number", number);
    }
    if let Some(international) = first_str(&doc, &["international"]) {
        record.set_basic("international", international);
    }
    let country = doc
        .pointer("/country/name")
        .and_then(Value::as_str)
        .or_else(|| first_str(&doc, &["country", "region"]))
        .map(str::to_string);
    if let Some(country) = country {
        record.set_basic("country", country.as_str());
        record.country = Some(country);
    }
    if let Some(location) = first_str(&doc, &["location"]) {
        record.set_basic("location", location);
    }
    if let Some(valid) = doc.get("valid").and_then(Value::as_bool) {
        record.set_basic("valid", valid);
    }
    if let Some(line_type) = first_str(&doc, &["line_type", "type"]) {
        record.set_basic("type", line_type);
    }
    record.carrier = first_str(&doc, &["carrier"]).map(str::to_string);

    let people: Vec<Value> = doc
        .get("associated_people")
        .and_then(Value::as_array)
        .map(|people| {
            people
                .iter()
                .filter_map(|p| p.get("name").and_then(Value::as_str))
                .map(|name| Value::String(name.to_string()))
                .collect()
        })
        .unwrap_or_default();
    if let Some(owner) = people
        .first()
        .and_then(Value::as_str)
        .or_else(|| first_str(&doc, &["name"]))
    {
        record.set_basic("owner", owner.to_string());
    }
    if !people.is_empty() {
        record
            .metadata
            .insert("associated_people".to_string(), Value::Array(people));
    }

    record.metadata.insert("phoneinfoga".to_string(), doc);
    record
}

fn from_text(clean: &str) -> PartialRecord {
    let lines: Vec<&str> = clean.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut record = PartialRecord::new("phoneinfoga");

    record.carrier = labeled_value(&lines, CARRIER_LABELS)
        .filter(|c| c.chars().count() > 2 && !c.ends_with(':'));
    record.country = labeled_value(&lines, COUNTRY_LABELS);

    if let Some(line_type) = labeled_value(&lines, TYPE_LABELS) {
        record.set_basic("type", line_type);
    }
    if let Some(location) = labeled_value(&lines, &["location", "city", "area"]) {
        record.set_basic("location", location);
    }
    if let Some(valid) = labeled_value(&lines, &["valid", "validity"]) {
        record.set_basic("valid", is_truthy(&valid));
    }
    if let Some(number) = labeled_value(&lines, &["number", "phone", "phone number"])
        .filter(|v| PHONE_VALUE_RE.is_match(v))
    {
        record.set_basic("number", number);
    }
    for (key, label) in [("e164", "E164"), ("international", "International"), ("local", "Local")] {
        if let Some(value) = labeled_value(&lines, &[label]) {
            record.set_basic(key, value);
        }
    }

    if record.carrier.is_none() && record.country.is_none() {
        let joined = lines.join(" ");
        record.carrier = loose_value(&joined, CARRIER_LABELS);
        record.country = loose_value(&joined, COUNTRY_LABELS);
        if !record.basic.contains_key("type") {
            if let Some(line_type) = loose_value(&joined, TYPE_LABELS) {
                record.set_basic("type", line_type);
            }
        }
    }

    if let Some(country) = record.country.clone() {
        record.set_basic("country", country);
    }
    record
        .metadata
        .insert("phoneinfoga".to_string(), json!({ "raw_output": lines }));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use osint_common::record::FieldValue;

    fn output(stdout: &str) -> ToolOutput {
        ToolOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_text_report() {
        let stdout = "Running scan for phone number +14155551234...\n\n\
                      Results for local\n\
                      Raw local: 4155551234\n\
                      Local: (415) 555-1234\n\
                      E164: +14155551234\n\
                      International: 14155551234\n\
                      Country: US\n\
                      Carrier: Verizon Wireless\n\
                      Line type: mobile\n\
                      Valid: true\n";
        let record = parse(&output(stdout), &SideChannel::default()).unwrap();
        assert_eq!(record.carrier.as_deref(), Some("Verizon Wireless"));
        assert_eq!(record.country.as_deref(), Some("US"));
        assert_eq!(record.basic.get("country"), Some(&FieldValue::from("US")));
        assert_eq!(record.basic.get("local"), Some(&FieldValue::from("(415) 555-1234")));
        assert_eq!(record.basic.get("e164"), Some(&FieldValue::from("+14155551234")));
        assert_eq!(record.basic.get("international"), Some(&FieldValue::from("14155551234")));
        assert_eq!(record.basic.get("type"), Some(&FieldValue::from("mobile")));
        assert_eq!(record.basic.get("valid"), Some(&FieldValue::Flag(true)));
        assert!(record.metadata["phoneinfoga"]["raw_output"].is_array());
    }

    #[test]
    fn test_short_carrier_rejected() {
        let record = parse(&output("Carrier: -\nCountry: FR\n"), &SideChannel::default()).unwrap();
        assert_eq!(record.carrier, None);
        assert_eq!(record.country.as_deref(), Some("FR"));
    }

    #[test]
    fn test_loose_pass_when_labels_missing() {
        let record = parse(
            &output("lookup done via network Orange in country France."),
            &SideChannel::default(),
        )
        .unwrap();
        assert_eq!(record.carrier.as_deref(), Some("Orange"));
        assert_eq!(record.country.as_deref(), Some("France"));
    }

    #[test]
    fn test_json_report() {
        let stdout = r#"{
            "number": "+14155551234",
            "international": "14155551234",
            "country": {"name": "United States"},
            "valid": true,
            "line_type": "mobile",
            "carrier": "AT&T",
            "associated_people": [{"name": "John Doe"}, {"name": "J. Doe"}]
        }"#;
        let record = parse(&output(stdout), &SideChannel::default()).unwrap();
        assert_eq!(record.carrier.as_deref(), Some("AT&T"));
        assert_eq!(record.country.as_deref(), Some("United States"));
        assert_eq!(record.basic.get("owner"), Some(&FieldValue::from("John Doe")));
        assert_eq!(record.basic.get("valid"), Some(&FieldValue::Flag(true)));
        assert_eq!(
            record.metadata["associated_people"],
            serde_json::json!(["John Doe", "J. Doe"])
        );
    }

    #[test]
    fn test_empty_output_is_none() {
        assert!(parse(&output("  \n"), &SideChannel::default()).is_none());
    }
}
