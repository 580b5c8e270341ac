//! Typed configuration for the Tendermint/CometBFT JSON-RPC node adapter.

use serde::{Deserialize, Serialize};

use chainindex_core::config::DurationConfig;
use chainindex_core::Height;

fn default_request_timeout() -> DurationConfig {
    DurationConfig(std::time::Duration::from_secs(10))
}

/// `tx_events_from_log_until_height` and
/// `decode_block_event_attributes_until_height` default to 0: fully
/// opt-in, matching chains that never ran the legacy log-encoded event
/// format. Raise either threshold to the chain's upgrade height to
/// reproduce the old behaviour for blocks produced before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: DurationConfig,
    #[serde(default)]
    pub tx_events_from_log_until_height: Height,
    #[serde(default)]
    pub decode_block_event_attributes_until_height: Height,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("url must not be empty".to_string());
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(format!("url '{}' must be http(s)", self.url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fully_opt_in() {
        let cfg: Config = serde_yaml::from_str("url: http://localhost:26657").unwrap();
        assert_eq!(cfg.tx_events_from_log_until_height, 0);
        assert_eq!(cfg.decode_block_event_attributes_until_height, 0);
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let cfg = Config {
            url: "ftp://node".into(),
            request_timeout: default_request_timeout(),
            tx_events_from_log_until_height: 0,
            decode_block_event_attributes_until_height: 0,
        };
        assert!(cfg.validate().is_err());
    }
}
