//! An in-memory [`Database`] backend: a mutex-guarded sorted map. Used by
//! unit tests and by `parse range` when no durable store is wired up.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chainindex_core::{Database, DatabaseError, Height};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
struct Row {
    indexer_name: String,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryStorage {
    // keyed by (chain_id, height)
    rows: Mutex<BTreeMap<(String, Height), Row>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for InMemoryStorage {
    async fn get_lowest_block(&self, chain_id: &str) -> Result<Option<Height>, DatabaseError> {
        let rows = self.rows.lock().expect("in-memory storage mutex poisoned");
        Ok(rows
            .keys()
            .filter(|(c, _)| c == chain_id)
            .map(|(_, h)| *h)
            .min())
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
        let rows = self.rows.lock().expect("in-memory storage mutex poisoned");
        Ok((from..=to)
            .filter(|h| !rows.contains_key(&(chain_id.to_string(), *h)))
            .collect())
    }

    async fn save_indexed_block(
        &self,
        indexer_name: &str,
        chain_id: &str,
        height: Height,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut rows = self.rows.lock().expect("in-memory storage mutex poisoned");
        rows.insert(
            (chain_id.to_string(), height),
            Row {
                indexer_name: indexer_name.to_string(),
                timestamp,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lowest_block_is_none_when_empty() {
        let db = InMemoryStorage::new();
        assert_eq!(db.get_lowest_block("chain-a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_blocks_rejects_inverted_range() {
        let db = InMemoryStorage::new();
        let err = db.get_missing_blocks("chain-a", 10, 5).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRange { from: 10, to: 5 }));
    }

    #[tokio::test]
    async fn missing_blocks_excludes_indexed_heights() {
        let db = InMemoryStorage::new();
        for h in [5, 7, 9] {
            db.save_indexed_block("idx1", "chain-a", h, Utc::now())
                .await
                .unwrap();
        }
        let missing = db.get_missing_blocks("chain-a", 5, 9).await.unwrap();
        assert_eq!(missing, vec![6, 8]);
        assert_eq!(db.get_lowest_block("chain-a").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn save_indexed_block_upserts() {
        let db = InMemoryStorage::new();
        let t1 = Utc::now();
        db.save_indexed_block("idx1", "chain-a", 10, t1).await.unwrap();
        let t2 = t1 + chrono::Duration::seconds(5);
        db.save_indexed_block("idx2", "chain-a", 10, t2).await.unwrap();
        let rows = db.rows.lock().unwrap();
        let row = rows.get(&("chain-a".to_string(), 10)).unwrap();
        assert_eq!(row.indexer_name, "idx2");
        assert_eq!(row.timestamp, t2);
    }

    #[tokio::test]
    async fn missing_blocks_single_height_range() {
        let db = InMemoryStorage::new();
        assert_eq!(
            db.get_missing_blocks("chain-a", 5, 5).await.unwrap(),
            vec![5]
        );
        db.save_indexed_block("idx1", "chain-a", 5, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            db.get_missing_blocks("chain-a", 5, 5).await.unwrap(),
            Vec::<Height>::new()
        );
    }
}
