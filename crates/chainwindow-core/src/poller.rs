//! Chain poller — fetches one block per request and classifies the outcome.

use std::sync::Arc;

use crate::client::LedgerClient;
use crate::error::SyncError;
use crate::types::BlockData;

/// Result of asking the ledger for a specific block.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The block exists; here is its data.
    Block(BlockData),
    /// The block has not been produced yet. Normal near the chain head.
    Pending,
}

/// Thin wrapper over the ledger client that turns "block missing" into an
/// explicit outcome. No retries here — the scheduler re-requests the same
/// block on the next tick.
pub struct ChainPoller {
    client: Arc<dyn LedgerClient>,
}

impl ChainPoller {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// Current chain height, used to seed the cursor on first startup.
    pub async fn head(&self) -> Result<u64, SyncError> {
        self.client.head_block_number().await
    }

    /// Fetch `number`, distinguishing "not yet produced" from failure.
    pub async fn fetch(&self, number: u64) -> Result<FetchOutcome, SyncError> {
        match self.client.block_with_transactions(number).await? {
            Some(block) => Ok(FetchOutcome::Block(block)),
            None => Ok(FetchOutcome::Pending),
        }
    }
}
