//! Configuration loading and data directory resolution
//!
//! Configuration comes from a TOML file where every section is optional and
//! falls back to compiled defaults. Paths left unset in the file are derived
//! from the data directory.
//!
//! # Resolution priority
//!
//! Config file:
//! 1. Command-line argument (`--config`)
//! 2. `OSINT_CONFIG` environment variable
//! 3. `<config_dir>/osint-engine/config.toml` if it exists
//! 4. Compiled defaults
//!
//! Data directory:
//! 1. Command-line argument (`--data-dir`)
//! 2. `OSINT_DATA_DIR` environment variable
//! 3. `<data_local_dir>/osint-engine`

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "OSINT_CONFIG";
pub const DATA_DIR_ENV_VAR: &str = "OSINT_DATA_DIR";
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

const APP_DIR_NAME: &str = "osint-engine";

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// A config file was named but does not exist
    Missing(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!(path = %path.display(), "Loaded configuration file")
            }
            ConfigSource::Missing(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
            ConfigSource::Defaults => info!("No config file, using compiled defaults"),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Resolved data directory (never read from the file)
    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Which persistence backend the gateway connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Sqlite,
    Postgres,
    /// Run without persistence (degraded mode from the start)
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// SQLite database file. Default: `<data_dir>/osint.db`
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    /// PostgreSQL connection string. `DATABASE_URL` overrides it.
    #[serde(default)]
    pub postgres_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Visitor and search rows older than this are pruned daily (0 keeps all)
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

/// External tool execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Managed runtime and locally installed releases. Default: `<data_dir>/tools`
    #[serde(default)]
    pub tools_dir: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Create the managed runtime on first use when it is missing
    #[serde(default)]
    pub bootstrap_runtime: bool,

    #[serde(default)]
    pub extra_search_paths: Vec<PathBuf>,

    /// Per-tool timeout overrides in seconds, keyed by tool name
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

/// Ephemeral artifact settings
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Per-run working directories. Default: `<data_dir>/temp`
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> StorageBackendKind {
    StorageBackendKind::Sqlite
}

fn default_max_connections() -> u32 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_retention_days() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_max_output_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: None,
            postgres_url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tools_dir: None,
            default_timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            bootstrap_runtime: false,
            extra_search_paths: Vec::new(),
            timeouts: HashMap::new(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl ToolsConfig {
    /// Wall-clock limit for one tool: per-tool override, else the default
    pub fn timeout_for(&self, tool: &str) -> Duration {
        let secs = self
            .timeouts
            .get(tool)
            .copied()
            .unwrap_or(self.default_timeout_secs);
        Duration::from_secs(secs)
    }
}

impl StorageConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `None` when retention pruning is disabled
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_days > 0)
            .then(|| Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60)))
    }
}

impl ArtifactsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AppConfig {
    /// Compiled defaults rooted at `data_dir`
    pub fn defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            tools: ToolsConfig::default(),
            artifacts: ArtifactsConfig::default(),
            data_dir: data_dir.into(),
        }
    }

    /// Parse TOML content rooted at `data_dir`
    pub fn from_toml_str(content: &str, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.data_dir = data_dir.into();
        Ok(config)
    }

    /// Load configuration from an optional file, apply environment
    /// overrides and validate
    ///
    /// A missing file falls back to defaults with a warning; a malformed
    /// file is an error.
    pub fn load(config_path: Option<&Path>, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let (config, source) = Self::load_with_source(config_path, data_dir)?;
        source.log();
        Ok(config)
    }

    /// Like [`AppConfig::load`], but leaves reporting where the
    /// configuration came from to the caller
    ///
    /// Used at startup, before the logging subscriber exists.
    pub fn load_with_source(
        config_path: Option<&Path>,
        data_dir: impl Into<PathBuf>,
    ) -> Result<(Self, ConfigSource)> {
        let data_dir = data_dir.into();

        let (mut config, source) = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
                })?;
                let config = Self::from_toml_str(&content, data_dir)?;
                (config, ConfigSource::File(path.to_path_buf()))
            }
            Some(path) => (
                Self::defaults(data_dir),
                ConfigSource::Missing(path.to_path_buf()),
            ),
            None => (Self::defaults(data_dir), ConfigSource::Defaults),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, source))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                self.storage.postgres_url = Some(url);
            }
        }
    }

    /// Reject settings that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.tools.max_output_bytes == 0 {
            return Err(Error::Config("tools.max_output_bytes must be > 0".to_string()));
        }
        if self.tools.default_timeout_secs == 0 {
            return Err(Error::Config(
                "tools.default_timeout_secs must be > 0".to_string(),
            ));
        }
        if let Some((tool, _)) = self.tools.timeouts.iter().find(|(_, secs)| **secs == 0) {
            return Err(Error::Config(format!("tools.timeouts.{} must be > 0", tool)));
        }
        if self.artifacts.ttl_secs == 0 {
            return Err(Error::Config("artifacts.ttl_secs must be > 0".to_string()));
        }
        if self.artifacts.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "artifacts.sweep_interval_secs must be > 0".to_string(),
            ));
        }
        if self.storage.backend == StorageBackendKind::Postgres
            && self
                .storage
                .postgres_url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
        {
            return Err(Error::Config(
                "storage.backend = \"postgres\" requires storage.postgres_url or DATABASE_URL"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.storage
            .sqlite_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("osint.db"))
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.tools
            .tools_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tools"))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.artifacts
            .work_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("temp"))
    }
}

/// Config file path following the priority order in the module docs
///
/// Returns `None` when no candidate applies; the caller then uses defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory, only if the file is there
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join("config.toml"))
        .filter(|p| p.exists())
}

/// Data directory following the priority order in the module docs
pub fn resolve_data_dir(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_dir()
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./osint_data"))
}
