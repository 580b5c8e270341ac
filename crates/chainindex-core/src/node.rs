//! The polymorphic node source contract (§4.2): the engine depends only
//! on this trait, never on a concrete chain backend.

use async_trait::async_trait;

use crate::block::Block;
use crate::cancel::CancellationToken;
use crate::error::IndexerError;
use crate::height::Height;

#[async_trait]
pub trait Node: Send + Sync {
    /// Stable string captured at construction (e.g. a Cosmos chain-id or
    /// an EVM numeric chain id rendered as a string).
    fn chain_id(&self) -> &str;

    async fn current_height(&self, token: &CancellationToken) -> Result<Height, IndexerError>;

    /// Lowest height still queryable. The generic probe-and-binary-search
    /// in [`crate::lowest_height`] is available to backends that have no
    /// cheaper way to learn this.
    async fn lowest_height(&self, token: &CancellationToken) -> Result<Height, IndexerError>;

    async fn block(&self, token: &CancellationToken, height: Height) -> Result<Block, IndexerError>;
}

/// Shared `LowestHeight` algorithm (§4.2): try height 0, else binary
/// search `[0, current]` for the smallest height a single probe answers.
/// `probe` should perform the cheapest call that tells us whether a
/// height is available (a header fetch, not necessarily a full block).
pub async fn binary_search_lowest_height<F, Fut>(
    token: &CancellationToken,
    current: Height,
    probe: F,
) -> Result<Height, IndexerError>
where
    F: Fn(Height) -> Fut,
    Fut: std::future::Future<Output = Result<bool, IndexerError>>,
{
    if probe(0).await? {
        return Ok(0);
    }
    let (mut lo, mut hi) = (0u64, current);
    while lo < hi {
        if token.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        let mid = lo + (hi - lo) / 2;
        if probe(mid).await? {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    Ok(lo)
}
