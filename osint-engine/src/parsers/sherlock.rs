//! Sherlock: `--print-found` prints one found profile URL per line

use super::text::{strip_noise, url_lines};
use super::SideChannel;
use crate::tools::ToolOutput;
use osint_common::PartialRecord;

pub fn parse(output: &ToolOutput, _side: &SideChannel) -> Option<PartialRecord> {
    let urls = url_lines(&strip_noise(&output.stdout));
    if urls.is_empty() {
        return None;
    }

    let mut record = PartialRecord::new("sherlock");
    record.social_profiles = urls;
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_found_lines() {
        let output = ToolOutput {
            stdout: "[*] Checking username johndoe on:\n\n\
                     [+] GitHub: https://www.github.com/johndoe\n\
                     [+] Twitter: http://twitter.com/johndoe\n\n\
                     [*] Search completed with 2 results\n"
                .to_string(),
            ..Default::default()
        };
        let record = parse(&output, &SideChannel::default()).unwrap();
        assert_eq!(record.source, "sherlock");
        assert_eq!(
            record.social_profiles,
            vec![
                "https://www.github.com/johndoe".to_string(),
                "https://twitter.com/johndoe".to_string()
            ]
        );
    }

    #[test]
    fn test_no_urls_is_none() {
        let output = ToolOutput {
            stdout: "[*] Search completed with 0 results\n".to_string(),
            ..Default::default()
        };
        assert!(parse(&output, &SideChannel::default()).is_none());
    }
}
