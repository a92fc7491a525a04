//! Typed repository over the three record kinds: sync state, transactions,
//! and accounts.
//!
//! Backends guarantee single-document atomicity only; there is no
//! multi-document transaction. Consistency after a crash mid-cycle is
//! restored by idempotent re-ingestion, not by rollback.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{AccountRecord, SyncState, TransactionRecord};

/// Storage interface consumed by the engine.
///
/// Hash-set mutation on accounts is expressed as set algebra
/// (`link_transaction` / `unlink_transaction`), never as positional edits,
/// and first-sighting account creation goes through the atomic
/// `insert_account_if_absent` so concurrent sightings converge to one record.
#[async_trait]
pub trait Repository: Send + Sync {
    // ── sync state ──
    /// Load the singleton sync state, if one has been created.
    async fn load_sync_state(&self) -> Result<Option<SyncState>, SyncError>;

    /// Create or replace the singleton sync state.
    async fn save_sync_state(&self, state: &SyncState) -> Result<(), SyncError>;

    /// Persist a new cursor position. Fails if no sync state exists.
    async fn set_cursor(&self, next_block: u64) -> Result<(), SyncError>;

    // ── transactions ──
    /// `true` if a transaction with this hash is already stored.
    async fn transaction_exists(&self, hash: &str) -> Result<bool, SyncError>;

    /// Insert a new transaction. Fails on a duplicate hash; callers are
    /// expected to check `transaction_exists` first.
    async fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), SyncError>;

    /// All transactions with `block_number < block`, ordered by block then hash.
    async fn transactions_below(&self, block: u64) -> Result<Vec<TransactionRecord>, SyncError>;

    /// Delete all transactions with `block_number < block`; returns the count.
    async fn delete_transactions_below(&self, block: u64) -> Result<u64, SyncError>;

    /// Transactions where `address` is sender or recipient, in block order.
    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, SyncError>;

    /// Number of stored transactions.
    async fn transaction_count(&self) -> Result<u64, SyncError>;

    // ── accounts ──
    /// Look up an account by address.
    async fn find_account(&self, address: &str) -> Result<Option<AccountRecord>, SyncError>;

    /// Insert the account only if no record with its address exists yet.
    /// Returns `false` (without touching the stored record) when one does.
    async fn insert_account_if_absent(&self, account: &AccountRecord) -> Result<bool, SyncError>;

    /// Add `hash` to the account's set and raise `latest_block` if needed.
    /// Fails if the account does not exist.
    async fn link_transaction(
        &self,
        address: &str,
        hash: &str,
        block_number: u64,
    ) -> Result<(), SyncError>;

    /// Remove `hash` from the account's set. Returns the remaining set size,
    /// or `None` if no such account exists.
    async fn unlink_transaction(
        &self,
        address: &str,
        hash: &str,
    ) -> Result<Option<usize>, SyncError>;

    /// Delete an account. Deleting a missing account is not an error.
    async fn delete_account(&self, address: &str) -> Result<(), SyncError>;

    /// All accounts, ordered by address.
    async fn all_accounts(&self) -> Result<Vec<AccountRecord>, SyncError>;

    /// Number of accounts, optionally filtered by contract/EOA kind.
    async fn account_count(&self, is_contract: Option<bool>) -> Result<u64, SyncError>;

    /// Persist a recomputed recency depth. A vanished account is ignored.
    async fn set_recency_depth(&self, address: &str, depth: f64) -> Result<(), SyncError>;
}

// ─── In-memory repository (tests / ephemeral deployments) ─────────────────────

#[derive(Default)]
struct MemoryState {
    sync: Option<SyncState>,
    transactions: HashMap<String, TransactionRecord>,
    accounts: HashMap<String, AccountRecord>,
}

/// In-memory repository. All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_sync_state(&self) -> Result<Option<SyncState>, SyncError> {
        Ok(self.state.lock().unwrap().sync.clone())
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<(), SyncError> {
        self.state.lock().unwrap().sync = Some(state.clone());
        Ok(())
    }

    async fn set_cursor(&self, next_block: u64) -> Result<(), SyncError> {
        let mut inner = self.state.lock().unwrap();
        match inner.sync.as_mut() {
            Some(sync) => {
                sync.next_block = next_block;
                sync.updated_at = chrono::Utc::now().timestamp();
                Ok(())
            }
            None => Err(SyncError::Storage("sync state missing".into())),
        }
    }

    async fn transaction_exists(&self, hash: &str) -> Result<bool, SyncError> {
        Ok(self.state.lock().unwrap().transactions.contains_key(hash))
    }

    async fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), SyncError> {
        let mut inner = self.state.lock().unwrap();
        if inner.transactions.contains_key(&tx.hash) {
            return Err(SyncError::Storage(format!(
                "duplicate transaction {}",
                tx.hash
            )));
        }
        inner.transactions.insert(tx.hash.clone(), tx.clone());
        Ok(())
    }

    async fn transactions_below(&self, block: u64) -> Result<Vec<TransactionRecord>, SyncError> {
        let inner = self.state.lock().unwrap();
        let mut out: Vec<_> = inner
            .transactions
            .values()
            .filter(|tx| tx.block_number < block)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.block_number, &a.hash).cmp(&(b.block_number, &b.hash)));
        Ok(out)
    }

    async fn delete_transactions_below(&self, block: u64) -> Result<u64, SyncError> {
        let mut inner = self.state.lock().unwrap();
        let before = inner.transactions.len();
        inner.transactions.retain(|_, tx| tx.block_number >= block);
        Ok((before - inner.transactions.len()) as u64)
    }

    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, SyncError> {
        let inner = self.state.lock().unwrap();
        let mut out: Vec<_> = inner
            .transactions
            .values()
            .filter(|tx| tx.from == address || tx.to.as_deref() == Some(address))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.block_number, &a.hash).cmp(&(b.block_number, &b.hash)));
        Ok(out)
    }

    async fn transaction_count(&self) -> Result<u64, SyncError> {
        Ok(self.state.lock().unwrap().transactions.len() as u64)
    }

    async fn find_account(&self, address: &str) -> Result<Option<AccountRecord>, SyncError> {
        Ok(self.state.lock().unwrap().accounts.get(address).cloned())
    }

    async fn insert_account_if_absent(&self, account: &AccountRecord) -> Result<bool, SyncError> {
        let mut inner = self.state.lock().unwrap();
        if inner.accounts.contains_key(&account.address) {
            return Ok(false);
        }
        inner
            .accounts
            .insert(account.address.clone(), account.clone());
        Ok(true)
    }

    async fn link_transaction(
        &self,
        address: &str,
        hash: &str,
        block_number: u64,
    ) -> Result<(), SyncError> {
        let mut inner = self.state.lock().unwrap();
        match inner.accounts.get_mut(address) {
            Some(account) => {
                account.transaction_hashes.insert(hash.to_string());
                account.latest_block = account.latest_block.max(block_number);
                Ok(())
            }
            None => Err(SyncError::Storage(format!("no account {address}"))),
        }
    }

    async fn unlink_transaction(
        &self,
        address: &str,
        hash: &str,
    ) -> Result<Option<usize>, SyncError> {
        let mut inner = self.state.lock().unwrap();
        match inner.accounts.get_mut(address) {
            Some(account) => {
                account.transaction_hashes.remove(hash);
                Ok(Some(account.transaction_hashes.len()))
            }
            None => Ok(None),
        }
    }

    async fn delete_account(&self, address: &str) -> Result<(), SyncError> {
        self.state.lock().unwrap().accounts.remove(address);
        Ok(())
    }

    async fn all_accounts(&self) -> Result<Vec<AccountRecord>, SyncError> {
        let inner = self.state.lock().unwrap();
        let mut out: Vec<_> = inner.accounts.values().cloned().collect();
        out.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(out)
    }

    async fn account_count(&self, is_contract: Option<bool>) -> Result<u64, SyncError> {
        let inner = self.state.lock().unwrap();
        let count = inner
            .accounts
            .values()
            .filter(|a| is_contract.map_or(true, |kind| a.is_contract == kind))
            .count();
        Ok(count as u64)
    }

    async fn set_recency_depth(&self, address: &str, depth: f64) -> Result<(), SyncError> {
        if let Some(account) = self.state.lock().unwrap().accounts.get_mut(address) {
            account.recency_depth = depth;
        }
        Ok(())
    }
}
