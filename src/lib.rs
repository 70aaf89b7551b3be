//! # price-ledger
//!
//! Retail price history service. Product snapshots collected from store
//! feeds and catalog scrapes are reconciled into per-store, per-SKU price
//! validity intervals: an interval asserts that a price held from its
//! first observation (`start`) to its last confirmation (`end`).
//!
//! ## Architecture
//!
//! ```text
//! Scheduler / POST /api/v1/runs
//!     │
//!     ├── ReconcileService (service/)
//!     │       │
//!     │       ├── SnapshotSource: feed | scraper (source/)
//!     │       ├── normalize (normalizer)
//!     │       ├── IntervalLedger (ledger/)
//!     │       ├── BatchAccumulator (batch)
//!     │       └── CommitCoordinator (commit)
//!     │
//!     └── PriceStore: PostgreSQL | memory (persistence/)
//!
//! import-history ── HistoricalImporter (importer) ── CommitCoordinator
//! ```

pub mod api;
pub mod app_state;
pub mod batch;
pub mod commit;
pub mod config;
pub mod domain;
pub mod error;
pub mod importer;
pub mod ledger;
pub mod normalizer;
pub mod persistence;
pub mod registry;
pub mod service;
pub mod source;
pub mod telemetry;
