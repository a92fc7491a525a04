//! SQLite repository backend.
//!
//! Persists the sync state, transactions, and accounts to a single SQLite
//! file. Uses `sqlx` with WAL mode for concurrent read performance; the
//! account hash set is stored as rows of an `account_transactions` table
//! whose composite primary key makes set-add an `INSERT OR IGNORE`.
//!
//! # Usage
//! ```rust,no_run
//! use chainwindow_storage::sqlite::SqliteRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let repo = SqliteRepository::open("./window.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let repo = SqliteRepository::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use chainwindow_core::error::SyncError;
use chainwindow_core::repo::Repository;
use chainwindow_core::types::{AccountRecord, SyncState, TransactionRecord};

fn storage_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Storage(e.to_string())
}

/// SQLite-backed repository.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./window.db"`) or a full
    /// SQLite URL (`"sqlite:./window.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Open an in-memory SQLite database. All data is lost on drop.
    ///
    /// A single pooled connection, so every query sees the same database.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// Create tables and the declared indices, and enable WAL mode.
    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sync_state (
                id          INTEGER PRIMARY KEY CHECK (id = 0),
                next_block  INTEGER NOT NULL,
                window_size INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                hash         TEXT PRIMARY KEY,
                block_number INTEGER NOT NULL,
                sender       TEXT NOT NULL,
                recipient    TEXT,
                value        TEXT NOT NULL,
                timestamp    INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_transactions_block ON transactions (block_number);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions (sender);",
            "CREATE INDEX IF NOT EXISTS idx_transactions_recipient ON transactions (recipient);",
        ] {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS accounts (
                address       TEXT PRIMARY KEY,
                is_contract   INTEGER NOT NULL,
                latest_block  INTEGER NOT NULL,
                recency_depth REAL NOT NULL DEFAULT 0
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS account_transactions (
                address TEXT NOT NULL,
                hash    TEXT NOT NULL,
                PRIMARY KEY (address, hash)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn account_hashes(&self, address: &str) -> Result<BTreeSet<String>, SyncError> {
        let rows = sqlx::query("SELECT hash FROM account_transactions WHERE address = ?")
            .bind(address)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("hash"))
            .collect())
    }
}

fn tx_from_row(row: &sqlx::sqlite::SqliteRow) -> TransactionRecord {
    TransactionRecord {
        hash: row.get("hash"),
        block_number: row.get::<i64, _>("block_number") as u64,
        from: row.get("sender"),
        to: row.get("recipient"),
        value: row.get("value"),
        timestamp: row.get("timestamp"),
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn load_sync_state(&self) -> Result<Option<SyncState>, SyncError> {
        let row = sqlx::query(
            "SELECT next_block, window_size, updated_at FROM sync_state WHERE id = 0",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|row| SyncState {
            next_block: row.get::<i64, _>("next_block") as u64,
            window_size: row.get::<i64, _>("window_size") as u64,
            updated_at: row.get("updated_at"),
        }))
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO sync_state (id, next_block, window_size, updated_at)
             VALUES (0, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 next_block = excluded.next_block,
                 window_size = excluded.window_size,
                 updated_at = excluded.updated_at",
        )
        .bind(state.next_block as i64)
        .bind(state.window_size as i64)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn set_cursor(&self, next_block: u64) -> Result<(), SyncError> {
        let result = sqlx::query("UPDATE sync_state SET next_block = ?, updated_at = ? WHERE id = 0")
            .bind(next_block as i64)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(SyncError::Storage("sync state missing".into()));
        }
        Ok(())
    }

    async fn transaction_exists(&self, hash: &str) -> Result<bool, SyncError> {
        let row = sqlx::query("SELECT 1 FROM transactions WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.is_some())
    }

    async fn insert_transaction(&self, tx: &TransactionRecord) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO transactions (hash, block_number, sender, recipient, value, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.hash)
        .bind(tx.block_number as i64)
        .bind(&tx.from)
        .bind(&tx.to)
        .bind(&tx.value)
        .bind(tx.timestamp)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn transactions_below(&self, block: u64) -> Result<Vec<TransactionRecord>, SyncError> {
        let rows = sqlx::query(
            "SELECT hash, block_number, sender, recipient, value, timestamp
             FROM transactions WHERE block_number < ?
             ORDER BY block_number, hash",
        )
        .bind(block as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.iter().map(tx_from_row).collect())
    }

    async fn delete_transactions_below(&self, block: u64) -> Result<u64, SyncError> {
        let result = sqlx::query("DELETE FROM transactions WHERE block_number < ?")
            .bind(block as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, SyncError> {
        let rows = sqlx::query(
            "SELECT hash, block_number, sender, recipient, value, timestamp
             FROM transactions WHERE sender = ? OR recipient = ?
             ORDER BY block_number, hash",
        )
        .bind(address)
        .bind(address)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.iter().map(tx_from_row).collect())
    }

    async fn transaction_count(&self) -> Result<u64, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn find_account(&self, address: &str) -> Result<Option<AccountRecord>, SyncError> {
        let row = sqlx::query(
            "SELECT address, is_contract, latest_block, recency_depth
             FROM accounts WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(AccountRecord {
            address: row.get("address"),
            is_contract: row.get::<i64, _>("is_contract") != 0,
            transaction_hashes: self.account_hashes(address).await?,
            latest_block: row.get::<i64, _>("latest_block") as u64,
            recency_depth: row.get("recency_depth"),
        }))
    }

    async fn insert_account_if_absent(&self, account: &AccountRecord) -> Result<bool, SyncError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO accounts (address, is_contract, latest_block, recency_depth)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&account.address)
        .bind(account.is_contract as i64)
        .bind(account.latest_block as i64)
        .bind(account.recency_depth)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for hash in &account.transaction_hashes {
            sqlx::query("INSERT OR IGNORE INTO account_transactions (address, hash) VALUES (?, ?)")
                .bind(&account.address)
                .bind(hash)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(true)
    }

    async fn link_transaction(
        &self,
        address: &str,
        hash: &str,
        block_number: u64,
    ) -> Result<(), SyncError> {
        let result = sqlx::query(
            "UPDATE accounts SET latest_block = MAX(latest_block, ?) WHERE address = ?",
        )
        .bind(block_number as i64)
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(SyncError::Storage(format!("no account {address}")));
        }

        sqlx::query("INSERT OR IGNORE INTO account_transactions (address, hash) VALUES (?, ?)")
            .bind(address)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn unlink_transaction(
        &self,
        address: &str,
        hash: &str,
    ) -> Result<Option<usize>, SyncError> {
        let exists = sqlx::query("SELECT 1 FROM accounts WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM account_transactions WHERE address = ? AND hash = ?")
            .bind(address)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        let row = sqlx::query("SELECT COUNT(*) AS n FROM account_transactions WHERE address = ?")
            .bind(address)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(Some(row.get::<i64, _>("n") as usize))
    }

    async fn delete_account(&self, address: &str) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM account_transactions WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM accounts WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn all_accounts(&self) -> Result<Vec<AccountRecord>, SyncError> {
        let rows = sqlx::query(
            "SELECT address, is_contract, latest_block, recency_depth
             FROM accounts ORDER BY address",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in &rows {
            let address: String = row.get("address");
            accounts.push(AccountRecord {
                transaction_hashes: self.account_hashes(&address).await?,
                address,
                is_contract: row.get::<i64, _>("is_contract") != 0,
                latest_block: row.get::<i64, _>("latest_block") as u64,
                recency_depth: row.get("recency_depth"),
            });
        }
        Ok(accounts)
    }

    async fn account_count(&self, is_contract: Option<bool>) -> Result<u64, SyncError> {
        let row = match is_contract {
            Some(kind) => sqlx::query("SELECT COUNT(*) AS n FROM accounts WHERE is_contract = ?")
                .bind(kind as i64)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?,
            None => sqlx::query("SELECT COUNT(*) AS n FROM accounts")
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?,
        };
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn set_recency_depth(&self, address: &str, depth: f64) -> Result<(), SyncError> {
        sqlx::query("UPDATE accounts SET recency_depth = ? WHERE address = ?")
            .bind(depth)
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
