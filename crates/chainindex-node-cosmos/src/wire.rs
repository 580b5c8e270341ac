//! Tendermint/CometBFT JSON-RPC wire shapes for `status`, `block`, and
//! `block_results`. Heights and gas figures travel as quoted integers on
//! the wire; a couple of small helpers below absorb that.

use serde::{Deserialize, Deserializer, Serialize};

use chainindex_core::Height;

fn height_from_string<'de, D>(deserializer: D) -> Result<Height, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn opt_height_to_string<S>(height: &Option<Height>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match height {
        Some(h) => serializer.serialize_str(&h.to_string()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusParams {}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub network: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    #[serde(deserialize_with = "height_from_string")]
    pub latest_block_height: Height,
    #[serde(deserialize_with = "height_from_string")]
    pub earliest_block_height: Height,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockParams {
    #[serde(serialize_with = "opt_height_to_string")]
    pub height: Option<Height>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeaderWire {
    pub chain_id: String,
    #[serde(deserialize_with = "height_from_string")]
    pub height: Height,
    pub time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDataWire {
    #[serde(default)]
    pub txs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockWire {
    pub header: BlockHeaderWire,
    pub data: BlockDataWire,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockResult {
    pub block: BlockWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockResultsParams {
    #[serde(serialize_with = "opt_height_to_string")]
    pub height: Option<Height>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbciEventAttributeWire {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbciEventWire {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<AbciEventAttributeWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbciMsgLog {
    pub msg_index: u32,
    #[serde(default)]
    pub events: Vec<AbciEventWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseDeliverTx {
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<AbciEventWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockResultsResult {
    #[serde(default)]
    pub txs_results: Vec<ResponseDeliverTx>,
    #[serde(default)]
    pub begin_block_events: Vec<AbciEventWire>,
    #[serde(default)]
    pub end_block_events: Vec<AbciEventWire>,
    #[serde(default)]
    pub finalize_block_events: Vec<AbciEventWire>,
}
