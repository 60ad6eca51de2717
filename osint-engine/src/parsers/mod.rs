//! Output parsers
//!
//! One function per tool turning captured output (plus, for some tools, a
//! file the tool wrote) into a [`PartialRecord`]. Parsers never fail: `None`
//! means the tool contributed nothing.
//!
//! General policy, in order:
//! 1. Structured parsing (JSON, newline-delimited JSON)
//! 2. Noise stripping, then line-oriented extraction; a line with a URL is a
//!    found profile
//! 3. Every URL normalized to start with its scheme
//! 4. Label matching (`label: value`) for semi-structured fields, with a
//!    looser whole-text pass as fallback

pub mod ghunt;
pub mod holehe;
pub mod maigret;
pub mod phoneinfoga;
pub mod sherlock;
pub mod text;

use crate::tools::{ToolId, ToolOutput};
use osint_common::PartialRecord;
use std::collections::HashMap;
use std::path::PathBuf;

/// Files a tool may have written besides stdout
#[derive(Debug, Clone, Default)]
pub struct SideChannel {
    /// Working directory the tool ran in
    pub work_dir: Option<PathBuf>,
    /// Output file whose path was passed to the tool
    pub output_file: Option<PathBuf>,
}

pub type ParseFn = fn(&ToolOutput, &SideChannel) -> Option<PartialRecord>;

/// Parser for a tool
pub fn parser_for(tool: ToolId) -> ParseFn {
    match tool {
        ToolId::Sherlock => sherlock::parse,
        ToolId::Holehe => holehe::parse,
        ToolId::Maigret => maigret::parse,
        ToolId::Ghunt => ghunt::parse,
        ToolId::Phoneinfoga => phoneinfoga::parse,
    }
}

/// Tool-to-parser table, built once at startup
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<ToolId, ParseFn>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    pub fn new() -> Self {
        let parsers = ToolId::ALL
            .iter()
            .map(|tool| (*tool, parser_for(*tool)))
            .collect();
        Self { parsers }
    }

    /// Replace one tool's parser
    pub fn with_parser(mut self, tool: ToolId, parser: ParseFn) -> Self {
        self.parsers.insert(tool, parser);
        self
    }

    /// Parse `output`; the record is always tagged with the tool's name
    pub fn parse(
        &self,
        tool: ToolId,
        output: &ToolOutput,
        side: &SideChannel,
    ) -> Option<PartialRecord> {
        let parser = self.parsers.get(&tool)?;
        let mut record = parser(output, side)?;
        record.source = tool.name().to_string();
        (!record.is_empty()).then_some(record)
    }
}
