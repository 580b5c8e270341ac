//! Wires every compiled-in database and node backend into a
//! [`chainindex_engine::Registry`]. Module factories are not registered
//! here: modules are the extension point embedders compile their own
//! handler crates into, and this binary ships none.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use chainindex_core::{BuilderError, Database};
use chainindex_engine::{DatabaseFactory, Registry};
use chainindex_node_cosmos::CosmosNodeFactory;
use chainindex_node_evm::EvmNodeFactory;
use chainindex_storage::InMemoryStorage;

#[derive(Debug, Deserialize)]
struct SqliteConfig {
    path: String,
}

struct SqliteDatabaseFactory;

#[async_trait]
impl DatabaseFactory for SqliteDatabaseFactory {
    async fn build(&self, raw_config: &[u8]) -> Result<Arc<dyn Database>, BuilderError> {
        let cfg: SqliteConfig = serde_yaml::from_slice(raw_config).map_err(|e| BuilderError::DatabaseFactory {
            id: "sqlite".into(),
            ty: "sqlite".into(),
            reason: format!("invalid config: {e}"),
        })?;
        let storage = chainindex_storage::SqliteStorage::open(&cfg.path)
            .await
            .map_err(|e| BuilderError::DatabaseFactory {
                id: "sqlite".into(),
                ty: "sqlite".into(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(storage))
    }
}

#[derive(Debug, Deserialize)]
struct PostgresConfig {
    url: String,
}

struct PostgresDatabaseFactory;

#[async_trait]
impl DatabaseFactory for PostgresDatabaseFactory {
    async fn build(&self, raw_config: &[u8]) -> Result<Arc<dyn Database>, BuilderError> {
        let cfg: PostgresConfig = serde_yaml::from_slice(raw_config).map_err(|e| BuilderError::DatabaseFactory {
            id: "postgres".into(),
            ty: "postgres".into(),
            reason: format!("invalid config: {e}"),
        })?;
        let storage = chainindex_storage::PostgresStorage::connect(&cfg.url)
            .await
            .map_err(|e| BuilderError::DatabaseFactory {
                id: "postgres".into(),
                ty: "postgres".into(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(storage))
    }
}

struct MemoryDatabaseFactory;

#[async_trait]
impl DatabaseFactory for MemoryDatabaseFactory {
    async fn build(&self, _raw_config: &[u8]) -> Result<Arc<dyn Database>, BuilderError> {
        Ok(Arc::new(InMemoryStorage::new()))
    }
}

/// Builds the registry this binary runs with: `memory`/`sqlite`/`postgres`
/// database backends, `cosmos-rpc`/`evm-rpc` node backends.
pub fn build_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_database("memory", Arc::new(MemoryDatabaseFactory));
    registry.register_database("sqlite", Arc::new(SqliteDatabaseFactory));
    registry.register_database("postgres", Arc::new(PostgresDatabaseFactory));
    registry.register_node(chainindex_node_cosmos::NODE_TYPE, Arc::new(CosmosNodeFactory));
    registry.register_node(chainindex_node_evm::NODE_TYPE, Arc::new(EvmNodeFactory));
    registry
}
