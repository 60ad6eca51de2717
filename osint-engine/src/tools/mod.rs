//! External tool execution layer
//!
//! Locating ([`resolver`]) and running ([`runner`]) the command-line
//! intelligence tools. Neither half ever fails a lookup: an unresolvable tool
//! is skipped, and a tool that crashes, hangs or floods its output comes back
//! as a typed [`ToolFailure`].

pub mod resolver;
pub mod runner;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use resolver::{ResolutionStrategy, ToolResolver};
pub use runner::{RunLimits, ToolRunner};

/// The supported tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolId {
    Sherlock,
    Holehe,
    Maigret,
    Ghunt,
    Phoneinfoga,
}

impl ToolId {
    pub const ALL: [ToolId; 5] = [
        ToolId::Sherlock,
        ToolId::Holehe,
        ToolId::Maigret,
        ToolId::Ghunt,
        ToolId::Phoneinfoga,
    ];

    /// Logical name, also the executable name and the provenance tag
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::Sherlock => "sherlock",
            ToolId::Holehe => "holehe",
            ToolId::Maigret => "maigret",
            ToolId::Ghunt => "ghunt",
            ToolId::Phoneinfoga => "phoneinfoga",
        }
    }

    /// Importable module names, in preference order (python tools only)
    pub fn python_modules(&self) -> &'static [&'static str] {
        match self {
            ToolId::Sherlock => &["sherlock_project", "sherlock"],
            ToolId::Holehe => &["holehe"],
            ToolId::Maigret => &["maigret"],
            ToolId::Ghunt => &["ghunt"],
            ToolId::Phoneinfoga => &[],
        }
    }

    /// Package installed into the managed runtime
    pub fn pip_package(&self) -> Option<&'static str> {
        match self {
            ToolId::Sherlock => Some("sherlock-project"),
            ToolId::Holehe => Some("holehe"),
            ToolId::Maigret => Some("maigret"),
            ToolId::Ghunt => Some("ghunt"),
            ToolId::Phoneinfoga => None,
        }
    }

    /// Distributed as a standalone release binary
    pub fn has_local_release(&self) -> bool {
        matches!(self, ToolId::Phoneinfoga)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How to start a tool
///
/// The command line is `executable arg_prefix... args...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInvocation {
    pub executable: PathBuf,
    pub arg_prefix: Vec<String>,
    pub available: bool,
}

impl ResolvedInvocation {
    pub fn direct(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arg_prefix: Vec::new(),
            available: true,
        }
    }

    /// `python -m <module>`
    pub fn python_module(python: impl Into<PathBuf>, module: &str) -> Self {
        Self {
            executable: python.into(),
            arg_prefix: vec!["-m".to_string(), module.to_string()],
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            executable: PathBuf::new(),
            arg_prefix: Vec::new(),
            available: false,
        }
    }
}

/// Captured output of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }
}

/// Kind of run failure, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Timeout,
    NonZeroExit,
    OutputTooLarge,
}

/// Why a tool run produced no regular output
#[derive(Error, Debug)]
pub enum ToolFailure {
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Killed at the deadline; `partial` holds what was read before the kill
    #[error("tool timed out after {timeout:?}")]
    Timeout { timeout: Duration, partial: ToolOutput },

    #[error("tool exited with status {code:?}")]
    NonZeroExit { code: Option<i32>, output: ToolOutput },

    /// Killed once captured output passed `limit` bytes
    #[error("tool output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize, partial: ToolOutput },
}

impl ToolFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ToolFailure::NotFound(_) => FailureKind::NotFound,
            ToolFailure::Timeout { .. } => FailureKind::Timeout,
            ToolFailure::NonZeroExit { .. } => FailureKind::NonZeroExit,
            ToolFailure::OutputTooLarge { .. } => FailureKind::OutputTooLarge,
        }
    }

    /// Output captured before a kill, worth parsing best-effort
    pub fn partial_output(&self) -> Option<&ToolOutput> {
        match self {
            ToolFailure::Timeout { partial, .. } | ToolFailure::OutputTooLarge { partial, .. } => {
                Some(partial).filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }
}
