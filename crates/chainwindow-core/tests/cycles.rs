//! End-to-end cycle behavior over the in-memory repository: the full
//! fetch → ingest → advance → evict → project pipeline under a scripted
//! ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chainwindow_core::{
    BlockData, CycleOutcome, LedgerClient, MemoryRepository, RawTransaction, Repository,
    SyncConfig, SyncError, SyncScheduler,
};

/// Ledger whose blocks are scripted by the test and extended as it goes.
struct ScriptedLedger {
    head: u64,
    blocks: Mutex<HashMap<u64, BlockData>>,
    contract_code: HashMap<String, String>,
}

impl ScriptedLedger {
    fn new(head: u64) -> Self {
        Self {
            head,
            blocks: Mutex::new(HashMap::new()),
            contract_code: HashMap::new(),
        }
    }

    fn add_block(&self, number: u64, txs: Vec<RawTransaction>) {
        self.blocks.lock().unwrap().insert(
            number,
            BlockData {
                number,
                timestamp: 1_700_000_000 + number as i64 * 12,
                transactions: txs,
            },
        );
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn head_block_number(&self) -> Result<u64, SyncError> {
        Ok(self.head)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockData>, SyncError> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn code_at(&self, address: &str) -> Result<String, SyncError> {
        Ok(self
            .contract_code
            .get(address)
            .cloned()
            .unwrap_or_else(|| "0x".into()))
    }
}

fn transfer(hash: &str, from: &str, to: &str) -> RawTransaction {
    RawTransaction {
        hash: hash.into(),
        from: from.into(),
        to: Some(to.into()),
        value: "0xde0b6b3a7640000".into(), // 1 token
    }
}

fn harness(head: u64, window: u64) -> (Arc<MemoryRepository>, Arc<ScriptedLedger>, SyncScheduler) {
    let repo = Arc::new(MemoryRepository::new());
    let ledger = Arc::new(ScriptedLedger::new(head));
    let config = SyncConfig {
        window_size: window,
        ..SyncConfig::default()
    };
    let scheduler = SyncScheduler::new(repo.clone(), ledger.clone(), config);
    (repo, ledger, scheduler)
}

async fn assert_invariants(repo: &MemoryRepository) {
    let state = repo.load_sync_state().await.unwrap().unwrap();
    let floor = state.window_floor();

    for account in repo.all_accounts().await.unwrap() {
        // No account survives with an empty hash set.
        assert!(
            !account.transaction_hashes.is_empty(),
            "orphan account {}",
            account.address
        );
        // Every referenced hash resolves to a stored transaction touching
        // this address.
        for hash in &account.transaction_hashes {
            let txs = repo.transactions_by_address(&account.address).await.unwrap();
            assert!(
                txs.iter().any(|t| &t.hash == hash),
                "dangling hash {hash} on {}",
                account.address
            );
        }
    }

    // Everything stored is inside the window.
    assert!(repo.transactions_below(floor).await.unwrap().is_empty());
}

// Scenario A: window 2, cursor 10, block 10 carries T1 from A to B.
#[tokio::test]
async fn first_block_creates_both_accounts() {
    let (repo, ledger, scheduler) = harness(10, 2);
    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xbbb")]);

    scheduler.initialize().await.unwrap();
    let outcome = scheduler.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Applied { block: 10, .. }));

    let state = repo.load_sync_state().await.unwrap().unwrap();
    assert_eq!(state.next_block, 11);

    for address in ["0xaaa", "0xbbb"] {
        let account = repo.find_account(address).await.unwrap().unwrap();
        assert_eq!(
            account.transaction_hashes.iter().collect::<Vec<_>>(),
            vec!["0xt1"]
        );
        assert_eq!(account.latest_block, 10);
    }
    assert_invariants(&repo).await;
}

// Scenario B: empty blocks 11 and 12 push T1 out of the window; the
// accounts it created go with it.
#[tokio::test]
async fn empty_blocks_age_out_old_transactions() {
    let (repo, ledger, scheduler) = harness(10, 2);
    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xbbb")]);
    ledger.add_block(11, vec![]);
    ledger.add_block(12, vec![]);

    scheduler.initialize().await.unwrap();
    for _ in 0..3 {
        scheduler.run_cycle().await.unwrap();
        assert_invariants(&repo).await;
    }

    let state = repo.load_sync_state().await.unwrap().unwrap();
    assert_eq!(state.next_block, 13);

    // Threshold 13 − 2 = 11 > 10, so T1 and both accounts are gone.
    assert!(!repo.transaction_exists("0xt1").await.unwrap());
    assert!(repo.find_account("0xaaa").await.unwrap().is_none());
    assert!(repo.find_account("0xbbb").await.unwrap().is_none());
    assert_eq!(repo.account_count(None).await.unwrap(), 0);
}

// Scenario C: the cursor block is not yet produced.
#[tokio::test]
async fn pending_block_changes_nothing() {
    let (repo, _ledger, scheduler) = harness(10, 2);
    // No blocks scripted at all — block 10 is pending.

    scheduler.initialize().await.unwrap();
    let outcome = scheduler.run_cycle().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Pending { block: 10 }));

    let state = repo.load_sync_state().await.unwrap().unwrap();
    assert_eq!(state.next_block, 10);
    assert_eq!(repo.transaction_count().await.unwrap(), 0);
    assert_eq!(repo.account_count(None).await.unwrap(), 0);
}

// Scenario D: the same block is fetched twice (a retried cycle).
#[tokio::test]
async fn refetched_block_is_idempotent() {
    let (repo, ledger, scheduler) = harness(10, 20);
    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xbbb")]);

    scheduler.initialize().await.unwrap();
    scheduler.run_cycle().await.unwrap();

    // Rewind the cursor as if the advance had been lost mid-cycle, then
    // process block 10 again.
    repo.set_cursor(10).await.unwrap();
    let outcome = scheduler.run_cycle().await.unwrap();
    match outcome {
        CycleOutcome::Applied { ingested, .. } => {
            assert_eq!(ingested.inserted, 0);
            assert_eq!(ingested.skipped, 1);
        }
        other => panic!("expected applied, got {other:?}"),
    }

    assert_eq!(repo.transaction_count().await.unwrap(), 1);
    let account = repo.find_account("0xaaa").await.unwrap().unwrap();
    assert_eq!(account.transaction_hashes.len(), 1);
    assert_invariants(&repo).await;
}

// Cursor only moves on success: pending and transient-failure cycles in
// between do not advance or rewind it.
#[tokio::test]
async fn cursor_is_monotone_across_mixed_outcomes() {
    let (repo, ledger, scheduler) = harness(10, 20);
    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xbbb")]);

    scheduler.initialize().await.unwrap();

    let mut cursors = vec![];
    for round in 0..5 {
        scheduler.run_cycle().await.unwrap();
        cursors.push(repo.load_sync_state().await.unwrap().unwrap().next_block);
        if round == 2 {
            ledger.add_block(11, vec![transfer("0xt2", "0xbbb", "0xccc")]);
        }
    }

    // Block 10 applied, then two pending ticks, then block 11, then pending.
    assert_eq!(cursors, vec![11, 11, 11, 12, 12]);
    assert_invariants(&repo).await;
}

// A long run over a window: the window invariant holds after every cycle
// and the census stays bounded.
#[tokio::test]
async fn window_invariant_holds_over_long_run() {
    let (repo, ledger, scheduler) = harness(0, 3);
    for number in 0..10 {
        let hash = format!("0xt{number}");
        let from = format!("0xsender{}", number % 2);
        let to = format!("0xrecipient{}", number % 3);
        ledger.add_block(number, vec![transfer(&hash, &from, &to)]);
    }

    scheduler.initialize().await.unwrap();
    for _ in 0..10 {
        scheduler.run_cycle().await.unwrap();
        assert_invariants(&repo).await;
    }

    let state = repo.load_sync_state().await.unwrap().unwrap();
    assert_eq!(state.next_block, 10);
    // Only blocks 7, 8, 9 remain.
    assert_eq!(repo.transaction_count().await.unwrap(), 3);
}

// Contract classification flows through the code probe into the census.
#[tokio::test]
async fn census_separates_contracts_from_eoas() {
    let repo = Arc::new(MemoryRepository::new());
    let mut ledger = ScriptedLedger::new(10);
    ledger
        .contract_code
        .insert("0xdex".into(), "0x6080604052".into());
    let ledger = Arc::new(ledger);
    let scheduler = SyncScheduler::new(
        repo.clone(),
        ledger.clone(),
        SyncConfig {
            window_size: 20,
            ..SyncConfig::default()
        },
    );

    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xdex")]);
    scheduler.initialize().await.unwrap();
    scheduler.run_cycle().await.unwrap();

    assert_eq!(repo.account_count(Some(true)).await.unwrap(), 1);
    assert_eq!(repo.account_count(Some(false)).await.unwrap(), 1);
    assert!(repo.find_account("0xdex").await.unwrap().unwrap().is_contract);
}

// Recency projection runs as part of the cycle.
#[tokio::test]
async fn recency_depth_tracks_account_age() {
    let (repo, ledger, scheduler) = harness(10, 4);
    ledger.add_block(10, vec![transfer("0xt1", "0xaaa", "0xbbb")]);
    ledger.add_block(11, vec![transfer("0xt2", "0xccc", "0xddd")]);

    scheduler.initialize().await.unwrap();
    scheduler.run_cycle().await.unwrap();
    scheduler.run_cycle().await.unwrap();

    // Cursor is 12: 0xaaa last moved in block 10 → (12 − 10 − 1) / 4 = 0.25;
    // 0xccc moved in block 11 → depth 0.
    let a = repo.find_account("0xaaa").await.unwrap().unwrap();
    let c = repo.find_account("0xccc").await.unwrap().unwrap();
    assert_eq!(a.recency_depth, 0.25);
    assert_eq!(c.recency_depth, 0.0);
}
