//! chainwindow-storage — durable repository backends.
//!
//! The in-memory repository lives in `chainwindow-core` next to the
//! `Repository` trait; this crate provides the persistent ones.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;
