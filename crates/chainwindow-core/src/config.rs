//! Sync-engine configuration and scheduler state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of trailing blocks retained. Everything older is evicted.
    pub window_size: u64,
    /// Fixed delay appended after each cycle, in milliseconds.
    /// This paces the loop; it is not a fixed-rate timer.
    pub tick_interval_ms: u64,
    /// Decimal precision used to render transaction values (18 for wei).
    pub value_decimals: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            tick_interval_ms: 6000,
            value_decimals: 18,
        }
    }
}

impl SyncConfig {
    /// The inter-cycle delay as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Runtime state of the scheduler.
///
/// There is no cancelled state — a process restart is the only recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Sync state not yet loaded or created.
    Uninitialized,
    /// Between cycles, waiting for the next tick.
    Idle,
    /// A cycle is executing. At most one at a time.
    Cycling,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Idle => write!(f, "idle"),
            Self::Cycling => write!(f, "cycling"),
        }
    }
}
