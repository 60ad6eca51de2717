//! Integration tests for the storage gateway over the SQLite backend
//!
//! Covers:
//! - Schema creation on first connect and reopen of an existing file
//! - Search log written at submission and finalized by id
//! - Artifact rows expiring by timestamp
//! - Stats, history ordering and reset
//! - Degraded mode when the backend cannot be opened

use chrono::Duration as ChronoDuration;
use osint_common::config::{AppConfig, StorageBackendKind};
use osint_common::record::AggregatedRecord;
use osint_common::storage::{SqliteStorage, StorageBackend, StorageGateway};
use osint_common::{time, QueryType};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn open_gateway(dir: &TempDir) -> (StorageGateway, Arc<SqliteStorage>) {
    let storage = SqliteStorage::connect(&dir.path().join("osint.db"), 5, Duration::from_secs(5))
        .await
        .expect("open sqlite");
    let storage = Arc::new(storage);
    (StorageGateway::with_backend(storage.clone()), storage)
}

#[tokio::test]
async fn test_connect_creates_database_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("osint.db");

    let storage = SqliteStorage::connect(&db_path, 2, Duration::from_secs(5)).await;
    assert!(storage.is_ok(), "connect failed: {:?}", storage.err());
    assert!(db_path.exists());

    // Reopening runs the idempotent schema again
    let again = SqliteStorage::connect(&db_path, 2, Duration::from_secs(5)).await;
    assert!(again.is_ok(), "reopen failed: {:?}", again.err());
}

#[tokio::test]
async fn test_gateway_connect_from_config() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::defaults(dir.path());
    assert_eq!(config.storage.backend, StorageBackendKind::Sqlite);

    let gateway = StorageGateway::connect(&config).await;
    assert!(gateway.is_connected());
    assert_eq!(gateway.backend_name(), Some("sqlite"));
    assert!(dir.path().join("osint.db").exists());
}

#[tokio::test]
async fn test_log_then_finalize_updates_same_row() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    let id = gateway
        .log_query("test@example.com", QueryType::Email)
        .await
        .expect("search id");

    let history = gateway.get_history(10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
    assert_eq!(history[0].query_type, "email");
    assert!(history[0].results.is_none());

    let record = AggregatedRecord::empty("test@example.com", QueryType::Email);
    assert!(
        gateway
            .finalize_result(Some(id), "test@example.com", QueryType::Email, &record)
            .await
    );

    let history = gateway.get_history(10).await;
    assert_eq!(history.len(), 1, "finalize must not add a second row");
    let results = history[0].results.as_ref().expect("results stored");
    assert_eq!(results["query"], "test@example.com");
    assert_eq!(results["type"], "email");
}

#[tokio::test]
async fn test_finalize_without_id_inserts_row() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    let record = AggregatedRecord::empty("johndoe", QueryType::Username);
    assert!(
        gateway
            .finalize_result(None, "johndoe", QueryType::Username, &record)
            .await
    );

    let history = gateway.get_history(10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "johndoe");
    assert!(history[0].results.is_some());
}

#[tokio::test]
async fn test_history_newest_first_and_limited() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    for name in ["alice", "bob", "carol"] {
        gateway.log_query(name, QueryType::Username).await.unwrap();
    }

    let history = gateway.get_history(2).await;
    let queries: Vec<&str> = history.iter().map(|e| e.query.as_str()).collect();
    assert_eq!(queries, vec!["carol", "bob"]);

    assert!(gateway.get_history(0).await.is_empty());
}

#[tokio::test]
async fn test_stats_count_visitors_and_searches() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    assert!(gateway.record_visitor("10.0.0.1", Some("curl/8.0")).await);
    assert!(gateway.record_visitor("10.0.0.2", None).await);
    gateway.log_query("johndoe", QueryType::Username).await;

    let stats = gateway.get_stats().await;
    assert_eq!(stats.total_visitors, 2);
    assert_eq!(stats.visitors_today, 2);
    assert_eq!(stats.search_count, 1);
}

#[tokio::test]
async fn test_expire_artifacts_returns_only_expired_paths() {
    let dir = TempDir::new().unwrap();
    let (_, storage) = open_gateway(&dir).await;

    let now = time::now();
    storage
        .record_artifact(None, "/tmp/old.csv", now - ChronoDuration::hours(1), now - ChronoDuration::minutes(1))
        .await
        .unwrap();
    storage
        .record_artifact(None, "/tmp/fresh.csv", now, now + ChronoDuration::minutes(30))
        .await
        .unwrap();

    let expired = storage.expire_artifacts(now).await.unwrap();
    assert_eq!(expired, vec!["/tmp/old.csv".to_string()]);

    // Rows are removed once reported
    assert!(storage.expire_artifacts(now).await.unwrap().is_empty());

    let later = now + ChronoDuration::hours(1);
    assert_eq!(
        storage.expire_artifacts(later).await.unwrap(),
        vec!["/tmp/fresh.csv".to_string()]
    );
}

#[tokio::test]
async fn test_record_artifact_links_search() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    let id = gateway.log_query("test@example.com", QueryType::Email).await;
    assert!(
        gateway
            .record_artifact(id, Path::new("/tmp/holehe_1_results.csv"), Duration::from_secs(1800))
            .await
    );
    // Not yet expired
    assert!(gateway.expire_artifacts().await.is_empty());
}

#[tokio::test]
async fn test_reset_counts_clears_everything() {
    let dir = TempDir::new().unwrap();
    let (gateway, _) = open_gateway(&dir).await;

    gateway.record_visitor("10.0.0.1", None).await;
    let id = gateway.log_query("johndoe", QueryType::Username).await;
    gateway
        .record_artifact(id, Path::new("/tmp/a.json"), Duration::from_secs(60))
        .await;

    assert!(gateway.reset_counts().await);

    let stats = gateway.get_stats().await;
    assert_eq!(stats.total_visitors, 0);
    assert_eq!(stats.search_count, 0);
    assert!(gateway.get_history(10).await.is_empty());
}

#[tokio::test]
async fn test_prune_removes_old_rows() {
    let dir = TempDir::new().unwrap();
    let (gateway, storage) = open_gateway(&dir).await;

    let long_ago = time::now() - ChronoDuration::days(40);
    storage
        .log_query("ancient", QueryType::Username, long_ago)
        .await
        .unwrap();
    storage
        .record_visitor("10.0.0.9", None, long_ago)
        .await
        .unwrap();
    gateway.log_query("recent", QueryType::Username).await;

    let removed = gateway
        .prune_older_than(Duration::from_secs(30 * 24 * 60 * 60))
        .await;
    assert_eq!(removed, 2);

    let history = gateway.get_history(10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "recent");
}

#[tokio::test]
async fn test_unopenable_database_degrades() {
    let dir = TempDir::new().unwrap();
    // A directory where the database file should be
    let blocked = dir.path().join("osint.db");
    std::fs::create_dir_all(&blocked).unwrap();

    let mut config = AppConfig::defaults(dir.path());
    config.storage.sqlite_path = Some(blocked);
    config.storage.connect_timeout_secs = 1;

    let gateway = StorageGateway::connect(&config).await;
    assert!(!gateway.is_connected());
    assert_eq!(gateway.get_stats().await.search_count, 0);
    assert_eq!(gateway.log_query("johndoe", QueryType::Username).await, None);
}
