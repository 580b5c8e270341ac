//! Pluggable transaction hashing. The node has no authoritative
//! `txhash` field of its own; every `Tx` gets its hash from hashing the
//! raw transaction bytes the block carries.

use sha2::{Digest, Sha256};

pub trait TxHasher: Send + Sync {
    fn hash(&self, raw_tx: &[u8]) -> String;
}

/// SHA-256 of the raw transaction bytes, hex-encoded upper-case — the
/// convention Tendermint-based chains use for tx hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl TxHasher for Sha256Hasher {
    fn hash(&self, raw_tx: &[u8]) -> String {
        let digest = Sha256::digest(raw_tx);
        hex::encode_upper(digest)
    }
}
