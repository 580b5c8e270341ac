//! The durable progress-store contract (§4.3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::height::Height;

#[async_trait]
pub trait Database: Send + Sync {
    async fn get_lowest_block(&self, chain_id: &str) -> Result<Option<Height>, DatabaseError>;

    /// `[from..=to] \ indexed(chain_id)`, ascending. Errors if `from >
    /// to`.
    async fn get_missing_blocks(
        &self,
        chain_id: &str,
        from: Height,
        to: Height,
    ) -> Result<Vec<Height>, DatabaseError>;

    /// Upsert; on `(chain_id, height)` conflict, refresh `timestamp` and
    /// `indexer_name`. Idempotent.
    async fn save_indexed_block(
        &self,
        indexer_name: &str,
        chain_id: &str,
        height: Height,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}
