//! Record types shared across the sync pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ─── BlockData ────────────────────────────────────────────────────────────────

/// A raw transaction as delivered by the ledger.
///
/// `value` is the untouched base-unit amount (hex or decimal string); it is
/// converted to its canonical decimal form at ingestion time. `to` is absent
/// for contract-creation transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
}

/// A fetched block: number, timestamp, and its ordered transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    /// Block number.
    pub number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// Transactions in block order.
    pub transactions: Vec<RawTransaction>,
}

// ─── TransactionRecord ────────────────────────────────────────────────────────

/// A stored transaction. Written once by ingestion, immutable afterwards,
/// removed only by the window evictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash (unique key).
    pub hash: String,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Sender address.
    pub from: String,
    /// Recipient address; `None` for contract creations.
    pub to: Option<String>,
    /// Canonical decimal value (base units divided by 10^decimals).
    pub value: String,
    /// Unix timestamp inherited from the block.
    pub timestamp: i64,
}

impl TransactionRecord {
    /// The participant addresses of this transaction, sender first.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.from.as_str()).chain(self.to.as_deref())
    }
}

// ─── AccountRecord ────────────────────────────────────────────────────────────

/// Per-address aggregate over the transactions currently inside the window.
///
/// Deleted as soon as `transaction_hashes` becomes empty — no account record
/// outlives its last windowed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Participant address (unique key).
    pub address: String,
    /// `true` if the address carries code. Fixed at creation.
    pub is_contract: bool,
    /// Hashes of stored transactions involving this address.
    pub transaction_hashes: BTreeSet<String>,
    /// Highest block number among those transactions.
    pub latest_block: u64,
    /// How far behind the cursor this account's latest activity is, in [0, 1].
    /// Recomputed in full every cycle by the recency projection.
    pub recency_depth: f64,
}

impl AccountRecord {
    /// Build the record for an address seen for the first time.
    pub fn first_seen(
        address: impl Into<String>,
        is_contract: bool,
        hash: impl Into<String>,
        block_number: u64,
    ) -> Self {
        let mut hashes = BTreeSet::new();
        hashes.insert(hash.into());
        Self {
            address: address.into(),
            is_contract,
            transaction_hashes: hashes,
            latest_block: block_number,
            recency_depth: 0.0,
        }
    }
}

// ─── SyncState ────────────────────────────────────────────────────────────────

/// The singleton sync-state document: cursor plus window size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// The next block the engine will attempt to fetch. Advances by exactly
    /// one per successful cycle and never decreases.
    pub next_block: u64,
    /// Number of trailing blocks retained.
    pub window_size: u64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

impl SyncState {
    /// Create a fresh sync state starting at `next_block`.
    pub fn new(next_block: u64, window_size: u64) -> Self {
        Self {
            next_block,
            window_size,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// First block number still inside the window `[cursor − window, cursor)`.
    pub fn window_floor(&self) -> u64 {
        self.next_block.saturating_sub(self.window_size)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_include_recipient_when_present() {
        let tx = TransactionRecord {
            hash: "0xt1".into(),
            block_number: 10,
            from: "0xaaa".into(),
            to: Some("0xbbb".into()),
            value: "1.0".into(),
            timestamp: 1_700_000_000,
        };
        let endpoints: Vec<_> = tx.endpoints().collect();
        assert_eq!(endpoints, vec!["0xaaa", "0xbbb"]);
    }

    #[test]
    fn endpoints_skip_missing_recipient() {
        let tx = TransactionRecord {
            hash: "0xt2".into(),
            block_number: 10,
            from: "0xaaa".into(),
            to: None,
            value: "0.0".into(),
            timestamp: 1_700_000_000,
        };
        let endpoints: Vec<_> = tx.endpoints().collect();
        assert_eq!(endpoints, vec!["0xaaa"]);
    }

    #[test]
    fn first_seen_starts_with_single_hash() {
        let account = AccountRecord::first_seen("0xaaa", false, "0xt1", 42);
        assert_eq!(account.transaction_hashes.len(), 1);
        assert!(account.transaction_hashes.contains("0xt1"));
        assert_eq!(account.latest_block, 42);
        assert_eq!(account.recency_depth, 0.0);
    }

    #[test]
    fn window_floor_saturates_near_genesis() {
        let state = SyncState::new(5, 20);
        assert_eq!(state.window_floor(), 0);

        let state = SyncState::new(100, 20);
        assert_eq!(state.window_floor(), 80);
    }
}
