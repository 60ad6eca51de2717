//! Networked PostgreSQL backend

use super::{SearchId, SearchLogEntry, Stats, StorageBackend};
use crate::query::QueryType;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect, verify the server answers and ensure the schema exists
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(Duration::from_secs(30))
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        let (server_time,): (DateTime<Utc>,) = sqlx::query_as("SELECT NOW()")
            .fetch_one(&pool)
            .await?;
        info!(server_time = %server_time, "Connected to PostgreSQL");

        let storage = Self { pool };
        storage.create_schema().await?;
        Ok(storage)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitors (
                id BIGSERIAL PRIMARY KEY,
                ip VARCHAR(45) NOT NULL,
                user_agent TEXT,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS searches (
                id BIGSERIAL PRIMARY KEY,
                query TEXT NOT NULL,
                query_type VARCHAR(20) NOT NULL,
                results JSONB,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Older deployments created searches without query_type
        if let Err(e) = sqlx::query(
            "ALTER TABLE searches ADD COLUMN IF NOT EXISTS query_type VARCHAR(20) NOT NULL DEFAULT 'unknown'",
        )
        .execute(&self.pool)
        .await
        {
            warn!(error = %e, "Failed to add query_type column to searches");
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS temp_files (
                id BIGSERIAL PRIMARY KEY,
                search_id BIGINT REFERENCES searches(id) ON DELETE SET NULL,
                file_path TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at TIMESTAMPTZ NOT NULL
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
impl StorageBackend for PostgresStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn log_query(
        &self,
        query: &str,
        query_type: QueryType,
        at: DateTime<Utc>,
    ) -> Result<SearchId> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO searches (query, query_type, results, timestamp) VALUES ($1, $2, NULL, $3) RETURNING id",
        )
        .bind(query)
        .bind(query_type.as_str())
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_result(&self, id: SearchId, results: &Value) -> Result<bool> {
        let result = sqlx::query("UPDATE searches SET results = $1 WHERE id = $2")
            .bind(Json(results))
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
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO searches (query, query_type, results, timestamp) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(query)
        .bind(query_type.as_str())
        .bind(Json(results))
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn record_artifact(
        &self,
        search_id: Option<SearchId>,
        path: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO temp_files (search_id, file_path, created_at, expires_at) VALUES ($1, $2, $3, $4)",
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
        let rows: Vec<(String,)> =
            sqlx::query_as("DELETE FROM temp_files WHERE expires_at < $1 RETURNING file_path")
                .bind(now)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    async fn get_stats(&self, day_start: DateTime<Utc>) -> Result<Stats> {
        let (total_visitors, visitors_today): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE timestamp >= $1) FROM visitors",
        )
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
        let rows: Vec<(i64, String, String, Option<Json<Value>>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT id, query, query_type, results, timestamp
                FROM searches
                ORDER BY timestamp DESC, id DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, query, query_type, results, timestamp)| SearchLogEntry {
                id,
                query,
                query_type,
                results: results.map(|Json(v)| v),
                timestamp,
            })
            .collect())
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
        sqlx::query("INSERT INTO visitors (ip, user_agent, timestamp) VALUES ($1, $2, $3)")
            .bind(ip)
            .bind(user_agent)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let searches = sqlx::query("DELETE FROM searches WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let visitors = sqlx::query("DELETE FROM visitors WHERE timestamp < $1")
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
