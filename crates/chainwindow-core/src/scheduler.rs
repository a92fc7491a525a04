//! Sync scheduler — owns the cursor and drives one ingestion cycle per tick.
//!
//! Each cycle: fetch the cursor block → ingest its transactions → advance and
//! persist the cursor → evict data outside the window → recompute recency.
//! The next tick is scheduled a fixed delay *after* the current cycle ends,
//! never on a fixed-rate clock, so a slow or failing source cannot cause
//! overlapping or runaway polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::LedgerClient;
use crate::config::{SchedulerState, SyncConfig};
use crate::error::SyncError;
use crate::evict::{EvictStats, WindowEvictor};
use crate::ingest::{IngestStats, IngestionEngine};
use crate::poller::{ChainPoller, FetchOutcome};
use crate::project::RecencyProjector;
use crate::repo::Repository;
use crate::types::SyncState;

/// What a single cycle did.
#[derive(Debug, Clone, Copy)]
pub enum CycleOutcome {
    /// The cursor block was fetched and fully processed; cursor advanced by one.
    Applied {
        block: u64,
        ingested: IngestStats,
        evicted: EvictStats,
    },
    /// The cursor block has not been produced yet; nothing changed.
    Pending { block: u64 },
    /// Another cycle was already in flight; this tick did nothing.
    Skipped,
}

/// Drives the fetch → ingest → advance → evict → project pipeline.
pub struct SyncScheduler {
    repo: Arc<dyn Repository>,
    poller: ChainPoller,
    ingest: IngestionEngine,
    evictor: WindowEvictor,
    projector: RecencyProjector,
    config: SyncConfig,
    state: Mutex<SchedulerState>,
    cycling: AtomicBool,
}

impl SyncScheduler {
    pub fn new(
        repo: Arc<dyn Repository>,
        client: Arc<dyn LedgerClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            poller: ChainPoller::new(client.clone()),
            ingest: IngestionEngine::new(repo.clone(), client, config.value_decimals),
            evictor: WindowEvictor::new(repo.clone()),
            projector: RecencyProjector::new(repo.clone()),
            repo,
            config,
            state: Mutex::new(SchedulerState::Uninitialized),
            cycling: AtomicBool::new(false),
        }
    }

    /// Current scheduler state.
    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap()
    }

    /// Load the persisted sync state or create one at the current chain head.
    ///
    /// A persisted cursor is always reused; the configured window size
    /// overwrites whatever was stored.
    pub async fn initialize(&self) -> Result<SyncState, SyncError> {
        let state = match self.repo.load_sync_state().await? {
            Some(mut state) => {
                if state.window_size != self.config.window_size {
                    state.window_size = self.config.window_size;
                    self.repo.save_sync_state(&state).await?;
                }
                tracing::info!(
                    next_block = state.next_block,
                    window = state.window_size,
                    "resuming from persisted cursor"
                );
                state
            }
            None => {
                let head = self.poller.head().await?;
                let state = SyncState::new(head, self.config.window_size);
                self.repo.save_sync_state(&state).await?;
                tracing::info!(
                    next_block = head,
                    window = state.window_size,
                    "connected to ledger; starting at current head"
                );
                state
            }
        };
        *self.state.lock().unwrap() = SchedulerState::Idle;
        Ok(state)
    }

    /// Execute one cycle. Single-flight: if a cycle is already in progress
    /// the call returns `CycleOutcome::Skipped` without touching anything.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        if self
            .cycling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(CycleOutcome::Skipped);
        }

        *self.state.lock().unwrap() = SchedulerState::Cycling;
        let result = self.cycle_inner().await;
        *self.state.lock().unwrap() = SchedulerState::Idle;
        self.cycling.store(false, Ordering::SeqCst);
        result
    }

    async fn cycle_inner(&self) -> Result<CycleOutcome, SyncError> {
        let sync = self
            .repo
            .load_sync_state()
            .await?
            .ok_or_else(|| SyncError::Storage("sync state missing; not initialized".into()))?;

        match self.poller.fetch(sync.next_block).await? {
            FetchOutcome::Pending => Ok(CycleOutcome::Pending {
                block: sync.next_block,
            }),
            FetchOutcome::Block(block) => {
                let ingested = self.ingest.apply(&block).await?;

                let next = sync.next_block + 1;
                self.repo.set_cursor(next).await?;

                let evicted = self.evictor.evict(next, sync.window_size).await?;
                self.projector.run(next, sync.window_size).await?;

                Ok(CycleOutcome::Applied {
                    block: sync.next_block,
                    ingested,
                    evicted,
                })
            }
        }
    }

    /// Run cycles forever, pacing with a fixed delay after each one.
    /// Never returns and never lets an error escape: every failure is
    /// cycle-scoped, logged, and retried against the same cursor.
    pub async fn run_forever(&self) {
        let tick = self.config.tick_interval();
        loop {
            if self.state() == SchedulerState::Uninitialized {
                if let Err(e) = self.initialize().await {
                    tracing::warn!(error = %e, "could not reach ledger or storage; will retry");
                    tokio::time::sleep(tick).await;
                    continue;
                }
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::Applied {
                    block,
                    ingested,
                    evicted,
                }) => {
                    tracing::info!(
                        block,
                        inserted = ingested.inserted,
                        skipped = ingested.skipped,
                        evicted_transactions = evicted.transactions,
                        evicted_accounts = evicted.accounts,
                        "block ingested"
                    );
                    if let Err(e) = self.log_census().await {
                        tracing::debug!(error = %e, "census unavailable");
                    }
                }
                Ok(CycleOutcome::Pending { block }) => {
                    tracing::debug!(block, "waiting on block");
                }
                Ok(CycleOutcome::Skipped) => {
                    tracing::warn!("cycle already in progress; skipping tick");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cycle failed; will retry next tick");
                }
            }

            tokio::time::sleep(tick).await;
        }
    }

    /// Per-cycle census of the window, in the log.
    async fn log_census(&self) -> Result<(), SyncError> {
        let accounts = self.repo.account_count(None).await?;
        let contracts = self.repo.account_count(Some(true)).await?;
        let eoas = self.repo.account_count(Some(false)).await?;
        let transactions = self.repo.transaction_count().await?;
        tracing::info!(accounts, contracts, eoas, transactions, "window census");
        Ok(())
    }
}
