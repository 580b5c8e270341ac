//! Ethereum JSON-RPC wire shapes. Every number on the wire is a
//! `0x`-prefixed hex string; `parse_hex_u64` is the one place that
//! understands that convention.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct BlockWire {
    pub hash: String,
    pub number: String,
    #[serde(rename = "parentHash")]
    pub parent_hash: String,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogWire {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiptWire {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogWire>,
}

/// Parses a `0x`-prefixed (or bare) hex string to `u64`. Malformed input
/// decodes as `0` rather than erroring; every caller already treats the
/// surrounding response as suspect if this matters.
pub fn parse_hex_u64(s: &str) -> u64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).unwrap_or(0)
}

pub fn to_hex_height(height: u64) -> String {
    format!("0x{height:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_u64_handles_prefixed_and_bare_input() {
        assert_eq!(parse_hex_u64("0x1"), 1);
        assert_eq!(parse_hex_u64("0xff"), 255);
        assert_eq!(parse_hex_u64("1234"), 0x1234);
    }

    #[test]
    fn to_hex_height_prefixes_lowercase_hex() {
        assert_eq!(to_hex_height(255), "0xff");
        assert_eq!(to_hex_height(0), "0x0");
    }
}
