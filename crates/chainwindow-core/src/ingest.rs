//! Ingestion engine — turns a fetched block into transaction records and
//! account aggregate updates, idempotently with respect to transaction hash.

use std::sync::Arc;

use crate::client::{is_contract_code, LedgerClient};
use crate::error::SyncError;
use crate::repo::Repository;
use crate::types::{AccountRecord, BlockData, TransactionRecord};
use crate::units;

/// Counters from one `apply` call, for the cycle log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Transactions newly recorded.
    pub inserted: u64,
    /// Transactions skipped because their hash was already stored.
    pub skipped: u64,
}

/// Converts a block's transaction list into stored records and account
/// updates. Safe to re-run on the same block: the duplicate-hash guard is
/// the sole mechanism preventing re-processing from corrupting aggregates.
pub struct IngestionEngine {
    repo: Arc<dyn Repository>,
    client: Arc<dyn LedgerClient>,
    value_decimals: u32,
}

impl IngestionEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Arc<dyn LedgerClient>,
        value_decimals: u32,
    ) -> Self {
        Self {
            repo,
            client,
            value_decimals,
        }
    }

    /// Ingest every transaction of `block`, in block order.
    ///
    /// Storage failures propagate and abandon the cycle; classification
    /// failures abandon only the affected endpoint's account update and are
    /// logged (the transaction record itself is kept either way).
    pub async fn apply(&self, block: &BlockData) -> Result<IngestStats, SyncError> {
        let mut stats = IngestStats::default();

        for raw in &block.transactions {
            if self.repo.transaction_exists(&raw.hash).await? {
                stats.skipped += 1;
                continue;
            }

            let record = TransactionRecord {
                hash: raw.hash.clone(),
                block_number: block.number,
                from: raw.from.clone(),
                to: raw.to.clone(),
                value: units::to_decimal_string(&raw.value, self.value_decimals)?,
                timestamp: block.timestamp,
            };
            self.repo.insert_transaction(&record).await?;
            stats.inserted += 1;

            for address in record.endpoints() {
                self.record_endpoint(address, &record.hash, record.block_number)
                    .await?;
            }
        }

        Ok(stats)
    }

    /// Fold one transaction endpoint into its account aggregate, creating and
    /// classifying the account on first sighting.
    async fn record_endpoint(
        &self,
        address: &str,
        hash: &str,
        block_number: u64,
    ) -> Result<(), SyncError> {
        if self.repo.find_account(address).await?.is_some() {
            return self.repo.link_transaction(address, hash, block_number).await;
        }

        let code = match self.client.code_at(address).await {
            Ok(code) => code,
            Err(e) => {
                // The transaction record stays; the hash will reference no
                // account until a later transaction recreates it.
                tracing::warn!(address, error = %e, "account classification failed");
                return Ok(());
            }
        };

        let account = AccountRecord::first_seen(address, is_contract_code(&code), hash, block_number);
        if !self.repo.insert_account_if_absent(&account).await? {
            // Lost a first-sighting race; converge on the existing record.
            self.repo.link_transaction(address, hash, block_number).await?;
        }
        Ok(())
    }
}
