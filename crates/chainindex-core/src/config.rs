//! Typed root configuration, matching the YAML shape deserialized
//! directly (no generic key-value lookup layer in between).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::height::Height;

fn default_workers() -> u32 {
    1
}

fn default_height_queue_size() -> u32 {
    100
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DurationConfig(pub Duration);

impl From<DurationConfig> for Duration {
    fn from(d: DurationConfig) -> Duration {
        d.0
    }
}

impl From<Duration> for DurationConfig {
    fn from(d: Duration) -> Self {
        DurationConfig(d)
    }
}

impl TryFrom<String> for DurationConfig {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        humantime::parse_duration(&value)
            .map(DurationConfig)
            .map_err(|e| format!("invalid duration '{value}': {e}"))
    }
}

impl From<DurationConfig> for String {
    fn from(d: DurationConfig) -> String {
        humantime::format_duration(d.0).to_string()
    }
}

fn default_node_polling_interval() -> DurationConfig {
    DurationConfig(Duration::from_secs(1))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_time_before_retry() -> DurationConfig {
    DurationConfig(Duration::from_secs(10))
}

/// An untyped option bag: a `type` discriminator plus whatever
/// type-specific fields the registered factory expects. Kept as a raw
/// [`serde_yaml::Value`] so the builder can re-serialize the subtree and
/// hand it unchanged to the factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl RawConfig {
    /// Re-encode this subtree to bytes for a factory to deserialize.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_yaml::Error> {
        serde_yaml::to_string(self).map(String::into_bytes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_monitoring_port")]
    pub port: u16,
}

fn default_monitoring_port() -> u16 {
    7070
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_monitoring_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub name: String,
    pub node_id: String,
    pub database_id: String,

    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default = "default_height_queue_size")]
    pub height_queue_size: u32,
    #[serde(default = "default_node_polling_interval")]
    pub node_polling_interval: DurationConfig,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_time_before_retry")]
    pub time_before_retry: DurationConfig,

    pub modules: Vec<String>,
    #[serde(default)]
    pub override_module_config: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub start_height: Option<Height>,
    #[serde(default)]
    pub force_reparse_old_blocks: bool,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    pub databases: BTreeMap<String, RawConfig>,
    pub nodes: BTreeMap<String, RawConfig>,
    #[serde(default)]
    pub modules: BTreeMap<String, RawConfig>,
    pub indexers: Vec<IndexerConfig>,
}

impl Config {
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every invariant from the data model before any builder
    /// factory runs: unique indexer names, resolvable `node_id` /
    /// `database_id` / `modules`, and sane numeric floors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for indexer in &self.indexers {
            if !seen.insert(indexer.name.clone()) {
                return Err(ConfigError::DuplicateIndexerName(indexer.name.clone()));
            }
            if !self.nodes.contains_key(&indexer.node_id) {
                return Err(ConfigError::UnknownNode {
                    indexer: indexer.name.clone(),
                    node_id: indexer.node_id.clone(),
                });
            }
            if !self.databases.contains_key(&indexer.database_id) {
                return Err(ConfigError::UnknownDatabase {
                    indexer: indexer.name.clone(),
                    database_id: indexer.database_id.clone(),
                });
            }
            if indexer.modules.is_empty() {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "modules",
                    reason: "must name at least one module".into(),
                });
            }
            if indexer.workers < 1 {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "workers",
                    reason: "must be >= 1".into(),
                });
            }
            if indexer.height_queue_size < 1 {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "height_queue_size",
                    reason: "must be >= 1".into(),
                });
            }
            if indexer.node_polling_interval.0 < Duration::from_millis(10) {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "node_polling_interval",
                    reason: "must be >= 10ms".into(),
                });
            }
            if indexer.max_attempts < 1 {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "max_attempts",
                    reason: "must be >= 1".into(),
                });
            }
            if indexer.time_before_retry.0 < Duration::from_millis(10) {
                return Err(ConfigError::InvalidField {
                    indexer: indexer.name.clone(),
                    field: "time_before_retry",
                    reason: "must be >= 10ms".into(),
                });
            }
        }
        Ok(())
    }

    pub fn indexer(&self, name: &str) -> Result<&IndexerConfig, ConfigError> {
        self.indexers
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ConfigError::NoSuchIndexer(name.to_string()))
    }

    /// The effective config for `module_name` within `indexer`: the base
    /// `modules[module_name]` subtree with the indexer's
    /// `override_module_config[module_name]` deep-merged on top (maps
    /// merge recursively, scalars and arrays are replaced wholesale). A
    /// module absent from the top-level `modules:` map is not an error;
    /// it yields an empty `RawConfig` for the factory to handle, the way
    /// the original indexer's module builder does.
    pub fn effective_module_config(
        &self,
        indexer: &IndexerConfig,
        module_name: &str,
    ) -> Result<RawConfig, ConfigError> {
        let default_base = RawConfig {
            type_name: String::new(),
            rest: serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
        };
        let base = self.modules.get(module_name).unwrap_or(&default_base);
        let mut merged = serde_yaml::to_value(base).map_err(ConfigError::Parse)?;
        if let Some(overlay) = indexer.override_module_config.get(module_name) {
            deep_merge(&mut merged, overlay);
        }
        serde_yaml::from_value(merged).map_err(ConfigError::Parse)
    }
}

/// Recursively merges `overlay` onto `base`: mappings merge key by key,
/// anything else in `overlay` replaces the corresponding value in `base`
/// outright.
pub fn deep_merge(base: &mut serde_yaml::Value, overlay: &serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
