//! Durable run state (SQLite via sqlx).
//!
//! Single source of truth for resumption: the page cursor, the per-item
//! terminal ledger (committed/failed), cumulative committed bytes, and
//! persisted manifest batches. Every mutating operation is awaited before
//! the corresponding effect counts as real; a write failure aborts the run.

pub mod db;
pub mod types;

mod batches;
mod progress;

pub use db::StateDb;
pub use types::*;
