//! Embedded SQLite backend

use super::{SearchId, SearchLogEntry, Stats, StorageBackend};
use crate::query::QueryType;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// File-based store, created on first connect
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database file and ensure the schema exists
    pub async fn connect(
        db_path: &Path,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        let storage = Self { pool };
        storage.create_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent schema creation
    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                user_agent TEXT,
                timestamp TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                query_type TEXT NOT NULL,
                results TEXT,
                timestamp TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS temp_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_id INTEGER REFERENCES searches(id) ON DELETE SET NULL,
                file_path TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                expires_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_visitors_ip ON visitors(ip)",
            "CREATE INDEX IF NOT EXISTS idx_visitors_timestamp ON visitors(timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_searches_query ON searches(query)",
            "CREATE INDEX IF NOT EXISTS idx_searches_timestamp ON searches(timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_temp_files_expires ON temp_files(expires_at)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn log_query(
        &self,
        query: &str,
        query_type: QueryType,
        at: DateTime<Utc>,
    ) -> Result<SearchId> {
        let result = sqlx::query(
            "INSERT INTO searches (query, query_type, results, timestamp) VALUES (?, ?, NULL, ?)",
        )
        .bind(query)
        .bind(query_type.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update_result(&self, id: SearchId, results: &Value) -> Result<bool> {
        let result = sqlx::query("UPDATE searches SET results = ? WHERE id = ?")
            .bind(results.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_result(
        &self,
        query: &str,
        query_type: QueryType,
        results: &Value,
        at: DateTime<Utc>,
    ) -> Result<SearchId> {
        let result = sqlx::query(
            "INSERT INTO searches (query, query_type, results, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(query)
        .bind(query_type.as_str())
        .bind(results.to_string())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn record_artifact(
        &self,
        search_id: Option<SearchId>,
        path: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO temp_files (search_id, file_path, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(search_id)
        .bind(path)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn expire_artifacts(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT file_path FROM temp_files WHERE expires_at < ?")
                .bind(now)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM temp_files WHERE expires_at < ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    async fn get_stats(&self, day_start: DateTime<Utc>) -> Result<Stats> {
        let (total_visitors,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM visitors")
            .fetch_one(&self.pool)
            .await?;

        let (visitors_today,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM visitors WHERE timestamp >= ?")
                .bind(day_start)
                .fetch_one(&self.pool)
                .await?;

        let (search_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM searches")
            .fetch_one(&self.pool)
            .await?;

        Ok(Stats {
            visitors_today,
            total_visitors,
            search_count,
        })
    }

    async fn get_history(&self, limit: i64) -> Result<Vec<SearchLogEntry>> {
        let rows: Vec<(i64, String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, query, query_type, results, timestamp
            FROM searches
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, query, query_type, results, timestamp)| -> Result<SearchLogEntry> {
                let results = results
                    .as_deref()
                    .map(serde_json::from_str::<Value>)
                    .transpose()?;
                Ok(SearchLogEntry {
                    id,
                    query,
                    query_type,
                    results,
                    timestamp,
                })
            })
            .collect()
    }

    async fn reset_counts(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM temp_files").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM searches").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM visitors").execute(&mut *tx).await?;
        tx.commit().await?;
        info!("Visitor, search and artifact counts reset");
        Ok(())
    }

    async fn record_visitor(
        &self,
        ip: &str,
        user_agent: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO visitors (ip, user_agent, timestamp) VALUES (?, ?, ?)")
            .bind(ip)
            .bind(user_agent)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let searches = sqlx::query("DELETE FROM searches WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let visitors = sqlx::query("DELETE FROM visitors WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(searches + visitors)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
