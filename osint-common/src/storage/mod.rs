//! Persistence gateway
//!
//! [`StorageGateway`] is the single persistence contract used by the engine.
//! It sits over one of two interchangeable [`StorageBackend`]s (embedded
//! SQLite or networked PostgreSQL), selected by configuration.
//!
//! The gateway never fails: when no backend is connected, or a backend call
//! errors, reads return zero/empty defaults and writes return a sentinel
//! (`None` / `false`). Callers stay functional in a storage-less mode.

pub mod postgres;
pub mod sqlite;

use crate::config::{AppConfig, StorageBackendKind};
use crate::query::QueryType;
use crate::record::AggregatedRecord;
use crate::{time, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;

/// Row id of a logged search
pub type SearchId = i64;

/// Coarse usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub visitors_today: i64,
    pub total_visitors: i64,
    pub search_count: i64,
}

/// One row of the search log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchLogEntry {
    pub id: SearchId,
    pub query: String,
    pub query_type: String,
    /// Final aggregated record, `None` while the search is in flight
    pub results: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Backend-specific persistence
///
/// Implementations propagate their errors; the gateway absorbs them.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn log_query(
        &self,
        query: &str,
        query_type: QueryType,
        at: DateTime<Utc>,
    ) -> Result<SearchId>;

    /// Update the row created by `log_query`
    ///
    /// Returns false when no row has that id.
    async fn update_result(&self, id: SearchId, results: &Value) -> Result<bool>;

    /// Insert a complete search row
    async fn insert_result(
        &self,
        query: &str,
        query_type: QueryType,
        results: &Value,
        at: DateTime<Utc>,
    ) -> Result<SearchId>;

    async fn record_artifact(
        &self,
        search_id: Option<SearchId>,
        path: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove artifact rows expired at `now`, returning their paths
    async fn expire_artifacts(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    async fn get_stats(&self, day_start: DateTime<Utc>) -> Result<Stats>;

    /// Newest first
    async fn get_history(&self, limit: i64) -> Result<Vec<SearchLogEntry>>;

    async fn reset_counts(&self) -> Result<()>;

    async fn record_visitor(
        &self,
        ip: &str,
        user_agent: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete visitors and finished searches older than `cutoff`
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn close(&self);
}

/// Degrading front door to the configured backend
#[derive(Debug, Clone, Default)]
pub struct StorageGateway {
    backend: Option<Arc<dyn StorageBackend>>,
}

impl StorageGateway {
    /// Gateway with no backend; every call returns its default
    pub fn disconnected() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Connect the backend chosen by configuration
    ///
    /// Connection failure is logged and yields a disconnected gateway.
    pub async fn connect(config: &AppConfig) -> Self {
        let storage = &config.storage;
        let connected: Result<Arc<dyn StorageBackend>> = match storage.backend {
            StorageBackendKind::Disabled => {
                info!("Storage disabled by configuration, running without persistence");
                return Self::disconnected();
            }
            StorageBackendKind::Sqlite => {
                SqliteStorage::connect(&config.sqlite_path(), storage.max_connections, storage.connect_timeout())
                    .await
                    .map(|s| Arc::new(s) as Arc<dyn StorageBackend>)
            }
            StorageBackendKind::Postgres => {
                let url = storage.postgres_url.clone().unwrap_or_default();
                PostgresStorage::connect(&url, storage.max_connections, storage.connect_timeout())
                    .await
                    .map(|s| Arc::new(s) as Arc<dyn StorageBackend>)
            }
        };

        match connected {
            Ok(backend) => {
                info!(backend = backend.name(), "Storage connected");
                Self::with_backend(backend)
            }
            Err(e) => {
                warn!(error = %e, "Storage unavailable, continuing in degraded mode");
                Self::disconnected()
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Log a submitted search; `None` when storage is unavailable
    pub async fn log_query(&self, query: &str, query_type: QueryType) -> Option<SearchId> {
        let backend = self.backend.as_ref()?;
        absorb("log_query", backend.log_query(query, query_type, time::now()).await)
    }

    /// Store the final record, correlated with `log_query` by id
    pub async fn finalize_result(
        &self,
        id: Option<SearchId>,
        query: &str,
        query_type: QueryType,
        record: &AggregatedRecord,
    ) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let results = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to serialize aggregated record");
                return false;
            }
        };

        let outcome = match id {
            Some(id) => match backend.update_result(id, &results).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    warn!(search_id = id, "Search row missing, inserting a new one");
                    backend
                        .insert_result(query, query_type, &results, time::now())
                        .await
                        .map(|_| ())
                }
                Err(e) => Err(e),
            },
            None => backend
                .insert_result(query, query_type, &results, time::now())
                .await
                .map(|_| ()),
        };
        absorb("finalize_result", outcome).is_some()
    }

    /// Persist an artifact registration expiring after `ttl`
    pub async fn record_artifact(
        &self,
        search_id: Option<SearchId>,
        path: &Path,
        ttl: Duration,
    ) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let created_at = time::now();
        let expires_at = time::add_ttl(created_at, ttl);
        let path = path.to_string_lossy();
        absorb(
            "record_artifact",
            backend
                .record_artifact(search_id, &path, created_at, expires_at)
                .await,
        )
        .is_some()
    }

    /// Drop expired artifact rows and return their paths for deletion
    pub async fn expire_artifacts(&self) -> Vec<String> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        absorb("expire_artifacts", backend.expire_artifacts(time::now()).await).unwrap_or_default()
    }

    pub async fn get_stats(&self) -> Stats {
        let Some(backend) = self.backend.as_ref() else {
            return Stats::default();
        };
        let day_start = time::start_of_day(time::now());
        absorb("get_stats", backend.get_stats(day_start).await).unwrap_or_default()
    }

    pub async fn get_history(&self, limit: i64) -> Vec<SearchLogEntry> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        absorb("get_history", backend.get_history(limit.max(0)).await).unwrap_or_default()
    }

    pub async fn reset_counts(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        absorb("reset_counts", backend.reset_counts().await).is_some()
    }

    pub async fn record_visitor(&self, ip: &str, user_agent: Option<&str>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        absorb(
            "record_visitor",
            backend.record_visitor(ip, user_agent, time::now()).await,
        )
        .is_some()
    }

    /// Delete history older than `retention`; returns rows removed
    pub async fn prune_older_than(&self, retention: Duration) -> u64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = time::now() - retention;
        absorb("prune_before", backend.prune_before(cutoff).await).unwrap_or_default()
    }

    pub async fn close(&self) {
        if let Some(backend) = self.backend.as_ref() {
            backend.close().await;
        }
    }
}

fn absorb<T>(operation: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation, error = %e, "Storage operation failed");
            None
        }
    }
}
