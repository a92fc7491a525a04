//! Ledger client trait — the engine's only view of the remote chain.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::BlockData;

/// Trait for talking to the remote ledger.
///
/// Implementations are stateless from the engine's point of view; retry is
/// achieved by the scheduler requesting the same block again next tick.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current chain height.
    async fn head_block_number(&self) -> Result<u64, SyncError>;

    /// Fetch a block with its full transaction list.
    ///
    /// `Ok(None)` means the block has not been produced yet — the normal,
    /// expected condition when the cursor sits at the chain head. Any other
    /// failure is an `Err` and treated as transient.
    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockData>, SyncError>;

    /// Deployed code at `address`, hex-encoded. `"0x"` means none.
    async fn code_at(&self, address: &str) -> Result<String, SyncError>;
}

/// Returns `true` if a `code_at` result denotes a contract.
/// Empty code (`"0x"`) denotes an externally-owned account.
pub fn is_contract_code(code: &str) -> bool {
    let code = code.strip_prefix("0x").unwrap_or(code);
    !code.is_empty()
}
