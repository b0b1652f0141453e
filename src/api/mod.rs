//! Web API module for the whale alert aggregator
//!
//! REST endpoints for the alert feed, the merge store, notifications, and
//! market data passthroughs.

pub mod routes;
pub mod server;

pub use server::{create_app, AppState, CycleOutcome};
