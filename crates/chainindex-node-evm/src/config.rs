//! Typed configuration for the Ethereum JSON-RPC node adapter.

use serde::{Deserialize, Serialize};

use chainindex_core::config::DurationConfig;

fn default_request_timeout() -> DurationConfig {
    DurationConfig(std::time::Duration::from_secs(10))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: DurationConfig,
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
