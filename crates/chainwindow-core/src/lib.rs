//! chainwindow-core — the windowed ledger ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! SyncScheduler (one cycle per tick, single-flight, sleep-paced)
//!     ├── ChainPoller      (block fetch: data | pending | transient error)
//!     ├── IngestionEngine  (idempotent records + account aggregates)
//!     ├── WindowEvictor    (drops data outside [cursor − window, cursor))
//!     ├── RecencyProjector (full recompute of per-account recency depth)
//!     └── Repository       (sync state / transactions / accounts)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod evict;
pub mod ingest;
pub mod poller;
pub mod project;
pub mod repo;
pub mod scheduler;
pub mod types;
pub mod units;

pub use client::LedgerClient;
pub use config::{SchedulerState, SyncConfig};
pub use error::SyncError;
pub use evict::{EvictStats, WindowEvictor};
pub use ingest::{IngestStats, IngestionEngine};
pub use poller::{ChainPoller, FetchOutcome};
pub use project::RecencyProjector;
pub use repo::{MemoryRepository, Repository};
pub use scheduler::{CycleOutcome, SyncScheduler};
pub use types::{AccountRecord, BlockData, RawTransaction, SyncState, TransactionRecord};
