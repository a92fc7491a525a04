//! Recency projection — a pure, full recompute over all accounts each cycle.
//!
//! The engine persists the value for consumers but derives no behavior from
//! it. No incremental state is carried between cycles.

use std::sync::Arc;

use crate::error::SyncError;
use crate::repo::Repository;

/// `clamp((next_block − latest_block − 1) / window_size, 0, 1)`.
///
/// 0.0 means the account was active in the most recently ingested block;
/// 1.0 means its activity sits at (or beyond) the far edge of the window.
pub fn recency_depth(next_block: u64, latest_block: u64, window_size: u64) -> f64 {
    let behind = next_block.saturating_sub(latest_block).saturating_sub(1);
    (behind as f64 / window_size.max(1) as f64).clamp(0.0, 1.0)
}

/// Recomputes and persists `recency_depth` for every account.
pub struct RecencyProjector {
    repo: Arc<dyn Repository>,
}

impl RecencyProjector {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn run(&self, next_block: u64, window_size: u64) -> Result<(), SyncError> {
        for account in self.repo.all_accounts().await? {
            let depth = recency_depth(next_block, account.latest_block, window_size);
            self.repo.set_recency_depth(&account.address, depth).await?;
        }
        Ok(())
    }
}
