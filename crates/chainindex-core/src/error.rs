//! Error types for the chainindex pipeline.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
/// Fatal: abort the process before any indexer is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("indexer '{0}' is defined more than once")]
    DuplicateIndexerName(String),

    #[error("indexer '{indexer}' references unknown node_id '{node_id}'")]
    UnknownNode { indexer: String, node_id: String },

    #[error("indexer '{indexer}' references unknown database_id '{database_id}'")]
    UnknownDatabase {
        indexer: String,
        database_id: String,
    },

    #[error("indexer '{indexer}' has invalid {field}: {reason}")]
    InvalidField {
        indexer: String,
        field: &'static str,
        reason: String,
    },

    #[error("no indexer named '{0}' in config")]
    NoSuchIndexer(String),
}

/// Errors raised while constructing database/node/module instances from
/// their registered factories.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("no database type '{0}' is registered")]
    UnknownDatabaseType(String),

    #[error("no node type '{0}' is registered")]
    UnknownNodeType(String),

    #[error("no module type '{0}' is registered")]
    UnknownModuleType(String),

    #[error("failed to build database '{id}' (type {ty}): {reason}")]
    DatabaseFactory {
        id: String,
        ty: String,
        reason: String,
    },

    #[error("failed to build node '{id}' (type {ty}): {reason}")]
    NodeFactory {
        id: String,
        ty: String,
        reason: String,
    },

    #[error("failed to build module '{name}': {reason}")]
    ModuleFactory { name: String, reason: String },

    #[error("failed to re-serialize config subtree for '{0}': {1}")]
    ConfigReencode(String, serde_yaml::Error),
}

/// Node adapter errors that are worth retrying (network blips, 5xx,
/// transient decode failures caused by a racing reorg on the remote
/// node).
#[derive(Debug, Error)]
pub enum TransientNodeError {
    #[error("network error calling {method}: {source}")]
    Network {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node returned server error (HTTP {status}) for {method}")]
    ServerError { method: String, status: u16 },

    #[error("failed to decode response for {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("node rpc error for {method}: code {code}, {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
}

/// Node adapter errors that will never succeed on retry.
#[derive(Debug, Error)]
pub enum PermanentNodeError {
    #[error("node rejected request for {method} (HTTP {status})")]
    ClientError { method: String, status: u16 },

    #[error("height {height} is not available (pruned or not yet produced)")]
    NotAvailable { height: u64 },

    #[error("malformed response for {method}: {reason}")]
    Malformed { method: String, reason: String },
}

/// Durable-store errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database I/O error: {0}")]
    Io(#[from] sqlx::Error),

    #[error("invalid range: from ({from}) > to ({to})")]
    InvalidRange { from: u64, to: u64 },

    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// A user module's handler returned failure.
#[derive(Debug, Error)]
#[error("module '{module}' failed handling {context}: {reason}")]
pub struct ModuleError {
    pub module: String,
    pub context: String,
    pub reason: String,
}

/// Top-level error type threaded through the engine. Each worker-loop
/// suspension point and every builder call returns this.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    TransientNode(#[from] TransientNodeError),

    #[error(transparent)]
    PermanentNode(#[from] PermanentNodeError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// `true` for errors the worker loop should retry via `re_enqueue`
    /// rather than treat as fatal to the whole process.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            IndexerError::Config(_) | IndexerError::Builder(_) | IndexerError::Cancelled
        )
    }

    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, IndexerError::Config(_) | IndexerError::Builder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_and_builder_errors_are_not_retryable() {
        let err = IndexerError::Config(ConfigError::NoSuchIndexer("foo".into()));
        assert!(!err.is_retryable());
        assert!(err.is_fatal_at_startup());
    }

    #[test]
    fn transient_node_errors_are_retryable() {
        let err = IndexerError::TransientNode(TransientNodeError::ServerError {
            method: "block".into(),
            status: 500,
        });
        assert!(err.is_retryable());
        assert!(!err.is_fatal_at_startup());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!IndexerError::Cancelled.is_retryable());
    }
}
