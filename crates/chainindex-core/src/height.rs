use serde::{Deserialize, Serialize};

/// Monotonic per-chain block height.
pub type Height = u64;

/// Sentinel for "no upper bound."
pub const MAX_HEIGHT: Height = u64::MAX;

/// A height travelling through a [`crate::queue`] queue, carrying its
/// retry count so the worker can decide whether to re-enqueue or drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerHeight {
    pub height: Height,
    pub attempts: u32,
}

impl IndexerHeight {
    pub fn new(height: Height) -> Self {
        Self { height, attempts: 0 }
    }

    pub fn with_attempts(height: Height, attempts: u32) -> Self {
        Self { height, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_starts_at_zero_attempts() {
        let h = IndexerHeight::new(42);
        assert_eq!(h.height, 42);
        assert_eq!(h.attempts, 0);
    }
}
