//! Builder/registry (§2, §9 "Untyped config bags" and "Global-object
//! bag"): constructs databases, nodes, and modules from registered
//! factories keyed by the config's `type` discriminator, then assembles
//! [`Indexer`]s.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use chainindex_core::{
    BuilderError, CancellationToken, Config, Database, GlobalObjects, IndexerError, Module, Node,
};

use crate::indexer::Indexer;

#[async_trait]
pub trait DatabaseFactory: Send + Sync {
    async fn build(&self, raw_config: &[u8]) -> Result<Arc<dyn Database>, BuilderError>;
}

#[async_trait]
pub trait NodeFactory: Send + Sync {
    async fn build(&self, raw_config: &[u8]) -> Result<Arc<dyn Node>, BuilderError>;
}

#[async_trait]
pub trait ModuleFactory: Send + Sync {
    async fn build(
        &self,
        token: &CancellationToken,
        database: Arc<dyn Database>,
        node: Arc<dyn Node>,
        raw_config: &[u8],
        globals: &GlobalObjects,
    ) -> Result<Module, BuilderError>;
}

/// The set of known database/node/module implementations, keyed by the
/// string each config subtree's `type` field names. Populated once at
/// process startup; read-only for the rest of the process lifetime.
#[derive(Default)]
pub struct Registry {
    databases: HashMap<String, Arc<dyn DatabaseFactory>>,
    nodes: HashMap<String, Arc<dyn NodeFactory>>,
    modules: HashMap<String, Arc<dyn ModuleFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_database(&mut self, type_name: impl Into<String>, factory: Arc<dyn DatabaseFactory>) {
        self.databases.insert(type_name.into(), factory);
    }

    pub fn register_node(&mut self, type_name: impl Into<String>, factory: Arc<dyn NodeFactory>) {
        self.nodes.insert(type_name.into(), factory);
    }

    pub fn register_module(&mut self, type_name: impl Into<String>, factory: Arc<dyn ModuleFactory>) {
        self.modules.insert(type_name.into(), factory);
    }
}

/// Constructs [`Indexer`]s from a validated [`Config`] against a
/// [`Registry`]. Config validation (unresolved `node_id`/`database_id`,
/// duplicate names) has already run in [`Config::from_yaml`]; failures
/// here are unknown registered types or a factory's own construction
/// error.
pub struct Builder<'a> {
    registry: &'a Registry,
    config: &'a Config,
    globals: GlobalObjects,
}

impl<'a> Builder<'a> {
    pub fn new(registry: &'a Registry, config: &'a Config, globals: GlobalObjects) -> Self {
        Self {
            registry,
            config,
            globals,
        }
    }

    /// Builds every indexer in the config, in declared order. Used by
    /// `start`.
    pub async fn build_all(&self, token: &CancellationToken) -> Result<Vec<Indexer>, IndexerError> {
        let mut indexers = Vec::with_capacity(self.config.indexers.len());
        for indexer_config in &self.config.indexers {
            indexers.push(self.build_named(token, &indexer_config.name).await?);
        }
        Ok(indexers)
    }

    /// Builds only the named indexer's database/node/modules, for
    /// one-shot commands like `parse range` that have no use for the
    /// rest of the config.
    pub async fn build_named(&self, token: &CancellationToken, name: &str) -> Result<Indexer, IndexerError> {
        let indexer_config = self.config.indexer(name)?.clone();

        let database = self.build_database(&indexer_config.database_id).await?;
        let node = self.build_node(&indexer_config.node_id).await?;

        let mut modules = Vec::with_capacity(indexer_config.modules.len());
        for module_name in &indexer_config.modules {
            let effective = self.config.effective_module_config(&indexer_config, module_name)?;
            let bytes = effective
                .to_bytes()
                .map_err(|e| BuilderError::ConfigReencode(module_name.clone(), e))?;
            let factory = self
                .registry
                .modules
                .get(&effective.type_name)
                .ok_or_else(|| BuilderError::UnknownModuleType(effective.type_name.clone()))?;
            let module = factory
                .build(token, database.clone(), node.clone(), &bytes, &self.globals)
                .await?;
            modules.push(module);
        }

        Ok(Indexer {
            name: indexer_config.name.clone(),
            node,
            database,
            modules: Arc::new(modules),
            config: indexer_config,
            custom_producer: None,
        })
    }

    async fn build_database(&self, database_id: &str) -> Result<Arc<dyn Database>, IndexerError> {
        let raw = self
            .config
            .databases
            .get(database_id)
            .expect("config validation guarantees database_id resolves");
        let bytes = raw
            .to_bytes()
            .map_err(|e| BuilderError::ConfigReencode(database_id.to_string(), e))?;
        let factory = self
            .registry
            .databases
            .get(&raw.type_name)
            .ok_or_else(|| BuilderError::UnknownDatabaseType(raw.type_name.clone()))?;
        factory
            .build(&bytes)
            .await
            .map_err(|e| {
                IndexerError::Builder(BuilderError::DatabaseFactory {
                    id: database_id.to_string(),
                    ty: raw.type_name.clone(),
                    reason: e.to_string(),
                })
            })
    }

    async fn build_node(&self, node_id: &str) -> Result<Arc<dyn Node>, IndexerError> {
        let raw = self
            .config
            .nodes
            .get(node_id)
            .expect("config validation guarantees node_id resolves");
        let bytes = raw
            .to_bytes()
            .map_err(|e| BuilderError::ConfigReencode(node_id.to_string(), e))?;
        let factory = self
            .registry
            .nodes
            .get(&raw.type_name)
            .ok_or_else(|| BuilderError::UnknownNodeType(raw.type_name.clone()))?;
        factory
            .build(&bytes)
            .await
            .map_err(|e| {
                IndexerError::Builder(BuilderError::NodeFactory {
                    id: node_id.to_string(),
                    ty: raw.type_name.clone(),
                    reason: e.to_string(),
                })
            })
    }
}
