//! Whale Alert Aggregator Library
//!
//! Aggregates prediction-market data from the public upstream APIs and
//! surfaces high-value "whale" trades:
//!
//! 1. **Ingestion**: fetch batches of raw trades, paging backward in time.
//! 2. **Valuation**: compute each trade's USD notional and keep only those
//!    above the whale threshold.
//! 3. **Enrichment**: join trades to human-readable event metadata through a
//!    multi-key identifier index, with an on-demand fallback lookup.
//! 4. **Merge**: maintain a bounded, deduplicated, newest-first alert
//!    history across polling cycles.
//!
//! Everything is best-effort: upstream failures degrade to partial results,
//! never user-facing errors.

pub mod api;
pub mod clob;
pub mod config;
pub mod data;
pub mod db;
pub mod gamma;
pub mod index;
pub mod notify;
pub mod pipeline;
pub mod poller;
pub mod store;
pub mod types;

pub use config::Config;
pub use db::{Database, Subscription};
pub use index::EventIndex;
pub use notify::Notifier;
pub use pipeline::WhalePipeline;
pub use poller::Poller;
pub use store::{AlertStore, MemoryStore, MergeOutcome};
pub use types::{EventMetadata, RawTrade, Side, TimeWindow, WhaleAlert};
