//! Startup gap computation (§4.6): the list of already-missed heights an
//! indexer must backfill before handing off to the live producer.

use chainindex_core::{CancellationToken, Database, Height, IndexerError, Node};

/// Returns `(gaps, current_height)`. `gaps` is empty whenever the
/// computed anchor is at or past `current_height - 1`, matching the
/// adapter's `from > to` contract rather than calling it with an
/// inverted or empty range.
pub async fn compute_gaps(
    token: &CancellationToken,
    node: &dyn Node,
    database: &dyn Database,
    chain_id: &str,
    start_height: Option<Height>,
    force_reparse_old_blocks: bool,
) -> Result<(Vec<Height>, Height), IndexerError> {
    let current = node.current_height(token).await?;

    if force_reparse_old_blocks {
        if let Some(start) = start_height {
            let gaps = if start <= current {
                (start..=current).collect()
            } else {
                Vec::new()
            };
            return Ok((gaps, current));
        }
    }

    let anchor = match start_height {
        Some(start) => start,
        None => match database.get_lowest_block(chain_id).await? {
            Some(lowest) if lowest < current => lowest,
            _ => current,
        },
    };

    let gaps = if current == 0 || anchor >= current {
        Vec::new()
    } else {
        database.get_missing_blocks(chain_id, anchor, current - 1).await?
    };

    Ok((gaps, current))
}
