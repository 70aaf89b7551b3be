//! Service layer: reconciliation runs and price queries.
//!
//! [`ReconcileService`] is the single entry point behind both the HTTP
//! trigger and the startup run. It wires the snapshot source, the ledger
//! and the commit coordinator together for each store.

pub mod reconcile_service;

pub use reconcile_service::{
    PriceAt, ProductHistory, ReconcileOptions, ReconcileService, RunSummary, StoreOutcome,
};
