use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::height::Height;

/// A single `key`/`value` attribute on an ABCI event, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosEventAttribute {
    pub key: String,
    pub value: String,
}

/// A Tendermint/CometBFT ABCI event: a type tag plus an ordered list of
/// attributes. `find_attribute` mirrors the lookup helpers the source
/// chain SDKs expose on the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<CosmosEventAttribute>,
}

impl CosmosEvent {
    pub fn find_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Chain-specific payload of a Cosmos transaction: the events produced by
/// executing it, already normalised to one shape regardless of whether
/// they were sourced from `TxResult.log` or `TxResult.events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CosmosTxData {
    pub events: Vec<CosmosEvent>,
}

/// Chain-specific payload of a Cosmos block: begin/end-block events,
/// already split when the node reports a combined `finalize_block`
/// event set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CosmosBlockData {
    pub begin_block_events: Vec<CosmosEvent>,
    pub end_block_events: Vec<CosmosEvent>,
}

/// An EVM log entry, attached both to its owning transaction and
/// flattened onto the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: u64,
    pub removed: bool,
}

/// Chain-specific payload of an EVM transaction: its receipt-derived
/// status is folded into `Tx::is_successful`; only the logs are
/// EVM-specific here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvmTxData {
    pub logs: Vec<EvmLog>,
}

/// Chain-specific payload of an EVM block: every log across every
/// receipt in the block, in receipt order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvmBlockData {
    pub logs: Vec<EvmLog>,
}

/// The chain-specific half of a [`Tx`]. Modules written against one
/// chain downcast via [`Tx::as_cosmos`]/[`Tx::as_evm`] rather than
/// matching this enum directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxVariant {
    Cosmos(CosmosTxData),
    Evm(EvmTxData),
}

/// A transaction within an indexed block. `hash` and `is_successful` are
/// the minimal shape the engine itself consumes; everything else lives
/// behind the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tx {
    pub hash: String,
    pub is_successful: bool,
    pub variant: TxVariant,
}

impl Tx {
    pub fn as_cosmos(&self) -> Option<&CosmosTxData> {
        match &self.variant {
            TxVariant::Cosmos(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_evm(&self) -> Option<&EvmTxData> {
        match &self.variant {
            TxVariant::Evm(data) => Some(data),
            _ => None,
        }
    }
}

/// The chain-specific half of a [`Block`]. See [`TxVariant`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockVariant {
    Cosmos(CosmosBlockData),
    Evm(EvmBlockData),
}

/// A fully fetched block: the common fields the engine and database
/// adapter operate on, plus chain-specific data behind `variant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub chain_id: String,
    pub height: Height,
    pub timestamp: DateTime<Utc>,
    pub txs: Vec<Tx>,
    pub variant: BlockVariant,
}

impl Block {
    pub fn as_cosmos(&self) -> Option<&CosmosBlockData> {
        match &self.variant {
            BlockVariant::Cosmos(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_evm(&self) -> Option<&EvmBlockData> {
        match &self.variant {
            BlockVariant::Evm(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cosmos_block() -> Block {
        Block {
            chain_id: "cosmoshub-4".into(),
            height: 100,
            timestamp: Utc::now(),
            txs: vec![Tx {
                hash: "ABCDEF".into(),
                is_successful: true,
                variant: TxVariant::Cosmos(CosmosTxData::default()),
            }],
            variant: BlockVariant::Cosmos(CosmosBlockData::default()),
        }
    }

    #[test]
    fn cosmos_downcast_succeeds_on_matching_variant() {
        let block = sample_cosmos_block();
        assert!(block.as_cosmos().is_some());
        assert!(block.as_evm().is_none());
        assert!(block.txs[0].as_cosmos().is_some());
        assert!(block.txs[0].as_evm().is_none());
    }

    #[test]
    fn find_attribute_returns_first_match() {
        let event = CosmosEvent {
            kind: "transfer".into(),
            attributes: vec![
                CosmosEventAttribute {
                    key: "amount".into(),
                    value: "10".into(),
                },
                CosmosEventAttribute {
                    key: "amount".into(),
                    value: "20".into(),
                },
            ],
        };
        assert_eq!(event.find_attribute("amount"), Some("10"));
        assert_eq!(event.find_attribute("missing"), None);
    }
}
