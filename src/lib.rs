//! OSRS Bank Companion Library
//!
//! Keeps two players' bank snapshots synchronized against a shared
//! JSON endpoint and compares them side by side.

pub mod compare;
pub mod freshness;
pub mod persistence;
pub mod reconcile;
pub mod remote;
pub mod state;
pub mod tsv;
pub mod types;

pub use compare::{CompareFilter, CompareRow, CompareSummary};
pub use freshness::Freshness;
pub use reconcile::{HydrateMode, Outcome, ReconcilePolicy};
pub use state::AppState;
pub use tsv::parse_tsv;
pub use types::*;
