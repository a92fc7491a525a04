//! Window evictor — removes transactions and account references that fall
//! outside the trailing window once the cursor has advanced.

use std::sync::Arc;

use crate::error::SyncError;
use crate::repo::Repository;

/// Counters from one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictStats {
    /// Transactions removed.
    pub transactions: u64,
    /// Accounts deleted because their hash set became empty.
    pub accounts: u64,
}

/// Deterministic single-pass eviction, linear in the number of evicted
/// transactions. Runs only after the cursor has advanced for the cycle.
pub struct WindowEvictor {
    repo: Arc<dyn Repository>,
}

impl WindowEvictor {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Evict everything with `block_number < next_block − window_size`.
    pub async fn evict(&self, next_block: u64, window_size: u64) -> Result<EvictStats, SyncError> {
        let threshold = next_block.saturating_sub(window_size);
        let expired = self.repo.transactions_below(threshold).await?;
        let mut stats = EvictStats::default();

        for tx in &expired {
            for address in tx.endpoints() {
                if let Some(0) = self.repo.unlink_transaction(address, &tx.hash).await? {
                    self.repo.delete_account(address).await?;
                    stats.accounts += 1;
                }
            }
        }

        stats.transactions = self.repo.delete_transactions_below(threshold).await?;
        if stats.transactions > 0 {
            tracing::debug!(
                threshold,
                transactions = stats.transactions,
                accounts = stats.accounts,
                "evicted data outside window"
            );
        }
        Ok(stats)
    }
}
