//! Text cleanup and extraction helpers shared by the parsers

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[()][A-Za-z0-9]").expect("valid ansi regex")
});

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*searching\s*\|").expect("valid progress regex"));

/// Remove ANSI escapes, carriage-return repaints and progress-bar lines
///
/// For a line repainted with `\r`, only the final paint is kept.
pub fn strip_noise(text: &str) -> String {
    let without_ansi = ANSI_RE.replace_all(text, "");
    without_ansi
        .split('\n')
        .map(|line| {
            let line = line.trim_end_matches('\r');
            line.rsplit('\r').next().unwrap_or(line)
        })
        .filter(|line| !line.trim().is_empty() && !PROGRESS_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop lines that start with one of the bracketed status markers
pub fn drop_status_lines(text: &str, markers: &[&str]) -> String {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !markers.iter().any(|m| trimmed.starts_with(m))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce a line containing a URL to `https://...`
///
/// Everything before the first `http://` or `https://` is discarded and the
/// URL ends at the first whitespace. Returns `None` when there is no URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let (start, scheme_len) = match (lower.find("http://"), lower.find("https://")) {
        (Some(h), Some(s)) if h < s => (h, "http://".len()),
        (_, Some(s)) => (s, "https://".len()),
        (Some(h), None) => (h, "http://".len()),
        (None, None) => return None,
    };

    let rest = &raw[start + scheme_len..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let rest = &rest[..end];
    if rest.is_empty() {
        return None;
    }
    Some(format!("https://{}", rest))
}

/// Every line holding a URL, normalized
pub fn url_lines(text: &str) -> Vec<String> {
    text.lines().filter_map(normalize_url).collect()
}

/// Value following `label[:=]` at the start of a line, for any of `labels`
///
/// Leading bullets and markers (`[+]`, `-`, `*`) are skipped; matching is
/// case-insensitive. The first matching line wins.
pub fn labeled_value(lines: &[&str], labels: &[&str]) -> Option<String> {
    let alternatives = labels
        .iter()
        .map(|l| regex::escape(l))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!(r"(?i)^[^A-Za-z0-9]*(?:{})\s*[:=]\s*(.+)$", alternatives)).ok()?;

    lines.iter().find_map(|line| {
        re.captures(line.trim())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// First word following any of `labels` anywhere in `text`
///
/// The looser second pass for text where the line-based pass found nothing.
pub fn loose_value(text: &str, labels: &[&str]) -> Option<String> {
    let alternatives = labels
        .iter()
        .map(|l| regex::escape(l))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!(
        r"(?i)\b(?:{})\b\s*[:=]?\s*([A-Za-z0-9&][A-Za-z0-9&\-]*)",
        alternatives
    ))
    .ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Interpret common truthy spellings
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "valid" | "[+]" | "1"
    )
}

/// Parse the whole payload as JSON, if it is JSON
pub fn parse_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Parse each non-empty line as JSON, skipping lines that are not
pub fn parse_ndjson(text: &str) -> Vec<Value> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.starts_with('{') || l.starts_with('['))
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

/// First non-empty string among `keys` of a JSON object
pub fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_discards_prefix() {
        assert_eq!(
            normalize_url("[twitter] http://x.com/a").as_deref(),
            Some("https://x.com/a")
        );
        assert_eq!(
            normalize_url("garbagehttps://x.com/a").as_deref(),
            Some("https://x.com/a")
        );
        assert_eq!(
            normalize_url("http://malformed/profile1").as_deref(),
            Some("https://malformed/profile1")
        );
    }

    #[test]
    fn test_normalize_url_case_and_trailing_text() {
        assert_eq!(
            normalize_url("[+] GitHub: HTTPS://github.com/johndoe (200)").as_deref(),
            Some("https://github.com/johndoe")
        );
        assert_eq!(normalize_url("no url here"), None);
        assert_eq!(normalize_url("https:// "), None);
    }

    #[test]
    fn test_normalize_url_is_idempotent() {
        let once = normalize_url("[x] http://site.com/u").unwrap();
        assert_eq!(normalize_url(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn test_strip_noise() {
        let raw = "\x1b[32m[+] GitHub: https://github.com/a\x1b[0m\r\n\
                   Searching |####      | 40/100 [00:02<00:03] in 2s\n\
                   50%\r75%\r100% done\n\n";
        let clean = strip_noise(raw);
        assert_eq!(clean, "[+] GitHub: https://github.com/a\n100% done");
    }

    #[test]
    fn test_drop_status_lines() {
        let text = "[-] not found\n[!] warning\n[*] info\n[+] Found: https://a.com/x";
        assert_eq!(
            drop_status_lines(text, &["[-]", "[!]", "[*]"]),
            "[+] Found: https://a.com/x"
        );
    }

    #[test]
    fn test_labeled_value() {
        let lines = ["Raw local: 4155551234", "Local: (415) 555-1234", "[+] Country = US"];
        assert_eq!(labeled_value(&lines, &["local"]).as_deref(), Some("(415) 555-1234"));
        assert_eq!(labeled_value(&lines, &["country", "region"]).as_deref(), Some("US"));
        assert_eq!(labeled_value(&lines, &["carrier"]), None);
    }

    #[test]
    fn test_loose_value() {
        let text = "scan complete network Verizon detected, country us";
        assert_eq!(loose_value(text, &["carrier", "network"]).as_deref(), Some("Verizon"));
        assert_eq!(loose_value(text, &["country"]).as_deref(), Some("us"));
        assert_eq!(loose_value("providers listed", &["provider"]), None);
    }

    #[test]
    fn test_parse_ndjson_skips_garbage() {
        let values = parse_ndjson("{\"a\":1}\nnot json\n{\"b\":2}\n{broken");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_first_str() {
        let v = serde_json::json!({"name": "", "displayName": "Jane", "fullName": "Jane Doe"});
        assert_eq!(first_str(&v, &["name", "displayName", "fullName"]), Some("Jane"));
        assert_eq!(first_str(&v, &["missing"]), None);
    }
}
