//! Tests for configuration file and data directory resolution
//!
//! Note: Uses serial_test to prevent environment variable races. Tests that
//! touch OSINT_CONFIG, OSINT_DATA_DIR or DATABASE_URL are marked #[serial].

use osint_common::config::{
    resolve_config_path, resolve_data_dir, AppConfig, ConfigSource, StorageBackendKind,
    CONFIG_ENV_VAR, DATABASE_URL_ENV_VAR, DATA_DIR_ENV_VAR,
};
use osint_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_config_path_wins_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let resolved = resolve_config_path(Some(Path::new("/tmp/from-cli.toml")));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-cli.toml")));
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/from-env.toml")));
}

#[test]
#[serial]
fn test_data_dir_priority() {
    env::set_var(DATA_DIR_ENV_VAR, "/tmp/osint-env-data");
    assert_eq!(
        resolve_data_dir(Some(Path::new("/tmp/osint-cli-data"))),
        PathBuf::from("/tmp/osint-cli-data")
    );
    assert_eq!(resolve_data_dir(None), PathBuf::from("/tmp/osint-env-data"));

    env::remove_var(DATA_DIR_ENV_VAR);
    let default = resolve_data_dir(None);
    assert!(!default.as_os_str().is_empty());
    assert!(default.ends_with("osint-engine") || default.ends_with("osint_data"));
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = AppConfig::load(Some(&missing), dir.path()).expect("defaults");
    assert_eq!(config.server.bind, "127.0.0.1:3000");
    assert_eq!(config.data_dir, dir.path());

    let (_, source) = AppConfig::load_with_source(Some(&missing), dir.path()).unwrap();
    assert_eq!(source, ConfigSource::Missing(missing.clone()));
}

#[test]
#[serial]
fn test_config_source_reported() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let (config, source) = AppConfig::load_with_source(Some(&path), dir.path()).unwrap();
    assert_eq!(source, ConfigSource::File(path.clone()));
    assert_eq!(config.logging.level, "debug");

    let (_, source) = AppConfig::load_with_source(None, dir.path()).unwrap();
    assert_eq!(source, ConfigSource::Defaults);
}

#[test]
#[serial]
fn test_load_reads_file() {
    env::remove_var(DATABASE_URL_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [server]
        bind = "0.0.0.0:8080"

        [logging]
        level = "debug"

        [storage]
        backend = "disabled"

        [tools]
        bootstrap_runtime = true
        extra_search_paths = ["/opt/osint/bin"]

        [artifacts]
        ttl_secs = 60
        "#,
    )
    .unwrap();

    let config = AppConfig::load(Some(&path), dir.path()).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.storage.backend, StorageBackendKind::Disabled);
    assert!(config.tools.bootstrap_runtime);
    assert_eq!(config.tools.extra_search_paths, vec![PathBuf::from("/opt/osint/bin")]);
    assert_eq!(config.artifacts.ttl_secs, 60);
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[tools\nmax_output_bytes = ").unwrap();

    let result = AppConfig::load(Some(&path), dir.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_database_url_env_satisfies_postgres_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[storage]\nbackend = \"postgres\"\n").unwrap();

    env::remove_var(DATABASE_URL_ENV_VAR);
    assert!(AppConfig::load(Some(&path), dir.path()).is_err());

    env::set_var(DATABASE_URL_ENV_VAR, "postgres://osint@localhost/osint");
    let config = AppConfig::load(Some(&path), dir.path());
    env::remove_var(DATABASE_URL_ENV_VAR);

    let config = config.expect("postgres config with DATABASE_URL");
    assert_eq!(
        config.storage.postgres_url.as_deref(),
        Some("postgres://osint@localhost/osint")
    );
}
