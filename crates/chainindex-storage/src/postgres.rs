//! PostgreSQL [`Database`] backend for ChainIndex.
//!
//! # Feature flag
//! Requires the `postgres` feature:
//! ```toml
//! chainindex-storage = { version = "0.2", features = ["postgres"] }
//! ```
//!
//! # Schema
//! A single `blocks` table keyed by `(chain_id, height)`, created with
//! `CREATE TABLE IF NOT EXISTS` on first connect — there is no migration
//! runner here, the schema is fixed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

use chainindex_core::{Database, DatabaseError, Height};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    chain_id     TEXT        NOT NULL,
    height       BIGINT      NOT NULL,
    indexer_name TEXT        NOT NULL,
    indexed_at   TIMESTAMPTZ NOT NULL,
    CONSTRAINT unique_chain_block UNIQUE (chain_id, height)
)";

#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: std::time::Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// Thread-safe, cheaply cloneable — wraps an `sqlx` connection pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(opts.connect_timeout)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        info!("postgres storage connected and schema ensured");
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PostgresStorage {
    async fn get_lowest_block(&self, chain_id: &str) -> Result<Option<Height>, DatabaseError> {
        let row = sqlx::query("SELECT height FROM blocks WHERE chain_id = $1 ORDER BY height ASC LIMIT 1")
            .bind(chain_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("height") as Height))
    }

    async fn get_missing_blocks(
        &self,
        chain_id: &str,
        from: Height,
        to: Height,
    ) -> Result<Vec<Height>, DatabaseError> {
        if from > to {
            return Err(DatabaseError::InvalidRange { from, to });
        }
        let rows = sqlx::query(
            "SELECT generate_series($1::bigint, $2::bigint) AS height
             EXCEPT
             SELECT height FROM blocks WHERE chain_id = $3
             ORDER BY 1",
        )
        .bind(from as i64)
        .bind(to as i64)
        .bind(chain_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<i64, _>("height") as Height)
            .collect())
    }

    async fn save_indexed_block(
        &self,
        indexer_name: &str,
        chain_id: &str,
        height: Height,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO blocks (chain_id, height, indexer_name, indexed_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT unique_chain_block
             DO UPDATE SET indexed_at = excluded.indexed_at, indexer_name = excluded.indexer_name",
        )
        .bind(chain_id)
        .bind(height as i64)
        .bind(indexer_name)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
