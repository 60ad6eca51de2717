//! Holehe: account-existence results for an email address
//!
//! With `-C` holehe writes `holehe_<timestamp>_<email>_results.csv` into its
//! working directory. That file is the primary source; its header is matched
//! by column name. Without a CSV, stdout is read as a JSON array and then as
//! `[+] site` lines.

use super::text::{is_truthy, parse_json, strip_noise};
use super::SideChannel;
use crate::tools::ToolOutput;
use osint_common::{LeakEntry, PartialRecord};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

pub fn parse(output: &ToolOutput, side: &SideChannel) -> Option<PartialRecord> {
    if let Some(csv_path) = side.work_dir.as_deref().and_then(newest_results_csv) {
        debug!(path = %csv_path.display(), "Reading holehe CSV results");
        // A CSV that exists but cannot be understood is a parse failure
        let content = std::fs::read_to_string(&csv_path).ok()?;
        return record_from(parse_csv(&content)?);
    }

    let clean = strip_noise(&output.stdout);
    if let Some(Value::Array(items)) = parse_json(&clean) {
        return record_from(leaks_from_json(&items));
    }
    record_from(leaks_from_lines(&clean))
}

/// Whether `path` names a holehe `-C` results file
pub fn is_results_csv(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .map_or(false, |name| {
            name.starts_with("holehe_") && name.ends_with("_results.csv")
        })
}

/// Most recently modified `holehe_*_results.csv` in `dir`
pub fn newest_results_csv(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| is_results_csv(&entry.path()))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

/// Existing sites from CSV content; `None` on a missing or unusable header
pub fn parse_csv(content: &str) -> Option<Vec<LeakEntry>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = split_csv_line(lines.next()?);
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let name_idx = column("name")?;
    let exists_idx = column("exists")?;

    let leaks = lines
        .map(split_csv_line)
        .filter_map(|cols| {
            let site = cols.get(name_idx)?.trim().to_string();
            let exists = cols.get(exists_idx).map_or(false, |v| is_truthy(v));
            (exists && !site.is_empty()).then(|| LeakEntry::found(site))
        })
        .collect();
    Some(leaks)
}

/// Split one CSV record, honoring double-quoted fields
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn leaks_from_json(items: &[Value]) -> Vec<LeakEntry> {
    items
        .iter()
        .filter(|item| item.get("exists").and_then(Value::as_bool) == Some(true))
        .filter_map(|item| {
            item.get("site")
                .or_else(|| item.get("name"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(LeakEntry::found)
        })
        .collect()
}

/// `[+] site.com` lines (holehe's found marker)
fn leaks_from_lines(text: &str) -> Vec<LeakEntry> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("[+]"))
        .filter(|rest| !is_legend(rest))
        .filter_map(|rest| {
            let site = rest.split(':').next()?.trim();
            (!site.is_empty()).then(|| LeakEntry::found(site))
        })
        .collect()
}

/// The `[+] Email used, [-] Email not used, ...` key printed with every run
fn is_legend(rest: &str) -> bool {
    let rest = rest.trim();
    rest.starts_with("Email used")
        || ["[-]", "[x]", "[!]"].iter().any(|marker| rest.contains(marker))
}

fn record_from(leaks: Vec<LeakEntry>) -> Option<PartialRecord> {
    if leaks.is_empty() {
        return None;
    }
    let mut record = PartialRecord::new("holehe");
    record.leaks = leaks;
    Some(record)
}
