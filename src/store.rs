//! Bounded, deduplicated, time-ordered whale alert history
//!
//! The merge is commutative and idempotent: re-merging an already-stored id
//! is a no-op, so concurrent callers need no coordination beyond the store's
//! own interior mutability.

use crate::types::{TimeWindow, WhaleAlert};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Default retention cap for the merged history
pub const HISTORY_CAP: usize = 1000;

/// Result of a merge: how many alerts were new, and the history size after
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MergeOutcome {
    pub added: usize,
    pub total: usize,
}

/// Merge new alerts into an existing history: dedup by id (existing entries
/// win), re-sort descending by timestamp, truncate to `cap` dropping the
/// oldest. Pure; both store implementations and tests go through it.
pub fn merge_alerts(
    existing: Vec<WhaleAlert>,
    incoming: &[WhaleAlert],
    cap: usize,
) -> (Vec<WhaleAlert>, usize) {
    let existing_ids: HashSet<&str> = existing.iter().map(|a| a.id.as_str()).collect();

    let unique_new: Vec<WhaleAlert> = incoming
        .iter()
        .filter(|a| !existing_ids.contains(a.id.as_str()))
        .cloned()
        .collect();
    let added = unique_new.len();

    let mut combined = unique_new;
    combined.extend(existing);

    // Re-sort defends against out-of-order arrival across concurrent fetches;
    // id tie-break keeps the order deterministic
    combined.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    combined.truncate(cap);

    (combined, added)
}

/// Read-time window filter: keeps alerts with `now - timestamp <= window`,
/// without mutating the stored history
pub fn filter_window(alerts: &[WhaleAlert], window: TimeWindow, now: i64) -> Vec<WhaleAlert> {
    alerts
        .iter()
        .filter(|a| now - a.timestamp <= window.seconds())
        .cloned()
        .collect()
}

/// Storage seam for the alert history. The durable implementation lives in
/// the database module; tests and the CLI use the in-memory stand-in. No
/// behavior depends on the medium.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Current history, most recent first, at most `limit` entries
    async fn read(&self, limit: usize) -> Result<Vec<WhaleAlert>>;

    /// Merge a batch into the history per the dedup rules
    async fn merge(&self, batch: &[WhaleAlert]) -> Result<MergeOutcome>;
}

/// In-memory alert store
pub struct MemoryStore {
    history: RwLock<Vec<WhaleAlert>>,
    cap: usize,
}

impl MemoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            cap,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(HISTORY_CAP)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn read(&self, limit: usize) -> Result<Vec<WhaleAlert>> {
        let history = self.history.read().await;
        Ok(history.iter().take(limit).cloned().collect())
    }

    async fn merge(&self, batch: &[WhaleAlert]) -> Result<MergeOutcome> {
        let mut history = self.history.write().await;
        let existing = std::mem::take(&mut *history);
        let (merged, added) = merge_alerts(existing, batch, self.cap);
        let total = merged.len();
        *history = merged;
        Ok(MergeOutcome { added, total })
    }
}
