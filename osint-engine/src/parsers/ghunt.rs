//! GHunt: Google account profile for an email address
//!
//! GHunt writes its report to the file passed with `--json`; stdout is only
//! consulted when that file is missing.

use super::text::{first_str, parse_json};
use super::SideChannel;
use crate::tools::ToolOutput;
use osint_common::PartialRecord;
use serde_json::Value;

struct FieldSpec {
    key: &'static str,
    in_profile: &'static [&'static str],
    top_level: &'static [&'static str],
    nested_profile: &'static [&'static str],
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "name",
        in_profile: &["name", "displayName", "fullName"],
        top_level: &["name", "full_name", "display_name", "displayName"],
        nested_profile: &["name", "displayName"],
    },
    FieldSpec {
        key: "picture",
        in_profile: &["picture", "profilePicture", "photo"],
        top_level: &["picture", "profile_picture", "profilePicture", "photo"],
        nested_profile: &["picture", "profilePicture"],
    },
    FieldSpec {
        key: "email",
        in_profile: &["email", "primaryEmail"],
        top_level: &["email", "primaryEmail"],
        nested_profile: &["email"],
    },
    FieldSpec {
        key: "google_id",
        in_profile: &["personId", "id", "googleId"],
        top_level: &["google_id", "id", "personId"],
        nested_profile: &[],
    },
    FieldSpec {
        key: "profile_id",
        in_profile: &["profileId", "id"],
        top_level: &["profile_id", "profileId", "id"],
        nested_profile: &[],
    },
];

pub fn parse(output: &ToolOutput, side: &SideChannel) -> Option<PartialRecord> {
    let doc = side
        .output_file
        .as_deref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| parse_json(&content))
        .or_else(|| parse_json(&output.stdout))?;
    if !doc.is_object() {
        return None;
    }

    Some(record_from_document(doc))
}

pub fn record_from_document(doc: Value) -> PartialRecord {
    let container_profile = doc.pointer("/PROFILE_CONTAINER/profile");
    let nested_profile = doc.get("profile");

    let mut record = PartialRecord::new("ghunt");
    for field in FIELDS {
        let value = container_profile
            .and_then(|p| first_str(p, field.in_profile))
            .or_else(|| first_str(&doc, field.top_level))
            .or_else(|| nested_profile.and_then(|p| first_str(p, field.nested_profile)));
        if let Some(value) = value {
            record.set_basic(field.key, value);
        }
    }

    let services = doc
        .pointer("/SERVICES_CONTAINER/services")
        .or_else(|| doc.get("services"))
        .or_else(|| doc.get("connected_services"))
        .or_else(|| doc.get("connectedServices"))
        .filter(|s| s.as_array().map_or(false, |a| !a.is_empty()))
        .cloned();
    if let Some(services) = services {
        record.metadata.insert("ghunt_services".to_string(), services);
    }

    record.metadata.insert("ghunt".to_string(), doc);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use osint_common::record::FieldValue;
    use serde_json::json;

    #[test]
    fn test_profile_container_preferred() {
        let doc = json!({
            "PROFILE_CONTAINER": {
                "profile": {
                    "displayName": "Jane Doe",
                    "personId": "1234567890",
                    "photo": "https://lh3.googleusercontent.com/a/x"
                }
            },
            "SERVICES_CONTAINER": {"services": ["Maps", "YouTube"]},
            "name": "ignored"
        });
        let record = record_from_document(doc);
        assert_eq!(record.basic.get("name"), Some(&FieldValue::from("Jane Doe")));
        assert_eq!(record.basic.get("google_id"), Some(&FieldValue::from("1234567890")));
        assert_eq!(
            record.basic.get("picture"),
            Some(&FieldValue::from("https://lh3.googleusercontent.com/a/x"))
        );
        assert_eq!(record.metadata["ghunt_services"], json!(["Maps", "YouTube"]));
        assert!(record.metadata.contains_key("ghunt"));
    }

    #[test]
    fn test_top_level_and_nested_fallbacks() {
        let doc = json!({
            "email": "jane@gmail.com",
            "profile": {"name": "Jane N."},
            "connected_services": []
        });
        let record = record_from_document(doc);
        assert_eq!(record.basic.get("email"), Some(&FieldValue::from("jane@gmail.com")));
        assert_eq!(record.basic.get("name"), Some(&FieldValue::from("Jane N.")));
        assert!(!record.metadata.contains_key("ghunt_services"));
    }

    #[test]
    fn test_output_file_then_stdout() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("ghunt.json");
        std::fs::write(&file, r#"{"name": "From File"}"#).unwrap();

        let output = ToolOutput {
            stdout: r#"{"name": "From Stdout"}"#.to_string(),
            ..Default::default()
        };
        let side = SideChannel {
            work_dir: None,
            output_file: Some(file.clone()),
        };
        let record = parse(&output, &side).unwrap();
        assert_eq!(record.basic.get("name"), Some(&FieldValue::from("From File")));

        std::fs::remove_file(&file).unwrap();
        let record = parse(&output, &side).unwrap();
        assert_eq!(record.basic.get("name"), Some(&FieldValue::from("From Stdout")));
    }

    #[test]
    fn test_non_json_is_none() {
        let output = ToolOutput {
            stdout: "[-] Not logged in, run `ghunt login`".to_string(),
            ..Default::default()
        };
        assert!(parse(&output, &SideChannel::default()).is_none());
    }
}
