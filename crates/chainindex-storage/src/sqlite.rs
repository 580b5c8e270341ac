//! SQLite [`Database`] backend for ChainIndex — single-node / dev
//! deployments. Same `blocks` schema and upsert semantics as
//! [`crate::postgres`], but gap enumeration uses a recursive CTE in
//! place of `generate_series`, since SQLite has no such builtin.
//!
//! # Feature flag
//! Requires the `sqlite` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

use chainindex_core::{Database, DatabaseError, Height};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    chain_id     TEXT     NOT NULL,
    height       INTEGER  NOT NULL,
    indexer_name TEXT     NOT NULL,
    indexed_at   TEXT     NOT NULL,
    UNIQUE (chain_id, height)
)";

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`. The path may be a
    /// plain file path (`"./index.db"`) or a full SQLite URL
    /// (`"sqlite:./index.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        info!(path, "sqlite storage opened and schema ensured");
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqliteStorage {
    async fn get_lowest_block(&self, chain_id: &str) -> Result<Option<Height>, DatabaseError> {
        let row = sqlx::query("SELECT height FROM blocks WHERE chain_id = ?1 ORDER BY height ASC LIMIT 1")
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
            "WITH RECURSIVE series(height) AS (
                SELECT ?1
                UNION ALL
                SELECT height + 1 FROM series WHERE height < ?2
             )
             SELECT height FROM series
             WHERE height NOT IN (SELECT height FROM blocks WHERE chain_id = ?3)
             ORDER BY height ASC",
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
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (chain_id, height)
             DO UPDATE SET indexed_at = excluded.indexed_at, indexer_name = excluded.indexer_name",
        )
        .bind(chain_id)
        .bind(height as i64)
        .bind(indexer_name)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_blocks_excludes_indexed_heights() {
        let store = SqliteStorage::in_memory().await.unwrap();
        for h in [5u64, 7, 9] {
            store
                .save_indexed_block("idx1", "chain-a", h, Utc::now())
                .await
                .unwrap();
        }
        let missing = store.get_missing_blocks("chain-a", 5, 9).await.unwrap();
        assert_eq!(missing, vec![6, 8]);
        assert_eq!(store.get_lowest_block("chain-a").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn missing_blocks_rejects_inverted_range() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let err = store.get_missing_blocks("chain-a", 10, 5).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRange { from: 10, to: 5 }));
    }

    #[tokio::test]
    async fn save_indexed_block_upserts_on_conflict() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let t1 = Utc::now();
        store.save_indexed_block("idx1", "chain-a", 1, t1).await.unwrap();
        let t2 = t1 + chrono::Duration::seconds(10);
        store.save_indexed_block("idx2", "chain-a", 1, t2).await.unwrap();
        let row = sqlx::query("SELECT indexer_name FROM blocks WHERE chain_id = 'chain-a' AND height = 1")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("indexer_name"), "idx2");
    }

    #[tokio::test]
    async fn lowest_block_is_none_when_empty() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert_eq!(store.get_lowest_block("chain-a").await.unwrap(), None);
    }
}
