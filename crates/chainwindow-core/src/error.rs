//! Error types for the sync engine.

use thiserror::Error;

/// Errors that can occur during a sync cycle.
///
/// All errors are cycle-scoped: the scheduler logs them and retries the same
/// cursor on the next tick. Nothing here terminates the process.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Returns `true` if the error came from the remote source and is
    /// expected to clear on its own (retry next tick, same block).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}
