//! Market-event join pipeline: ingestion, valuation, threshold filter, and
//! enrichment of raw trades into whale alerts

use crate::clob::ClobClient;
use crate::config::Config;
use crate::gamma::GammaClient;
use crate::index::EventIndex;
use crate::types::{market_url, EventMetadata, RawTrade, Side, WhaleAlert};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Cap on alerts produced per cycle
const MAX_BATCH: usize = 100;
/// Concurrent fallback metadata lookups
const FALLBACK_CONCURRENCY: usize = 8;
/// Per-lookup timeout so one stuck fallback cannot block the batch
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(4);

/// USD notional of a trade. The share-based calculation wins when a share
/// count is present; the precomputed amount is the fallback for the upstream
/// shape that reports USD directly. Computed once at ingestion, never
/// recomputed later.
pub fn trade_value(trade: &RawTrade) -> Decimal {
    let price = trade.price.unwrap_or(dec!(0.5));
    match trade.size {
        Some(size) if size > Decimal::ZERO => size * price,
        _ => trade.amount.unwrap_or(Decimal::ZERO),
    }
}

/// A trade that passed the whale threshold, with its computed notional and
/// stable id
#[derive(Debug, Clone)]
pub struct QualifiedTrade {
    pub trade: RawTrade,
    pub value: Decimal,
    pub id: String,
}

/// Apply valuation and the whale threshold, skipping records that lack the
/// fields needed for a stable identity. In-cycle duplicates are dropped here;
/// cross-cycle dedup is the merge store's job.
pub fn qualify(trades: Vec<RawTrade>, min_usd: Decimal) -> Vec<QualifiedTrade> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut qualified = Vec::new();

    for trade in trades {
        let value = trade_value(&trade);
        if value < min_usd {
            continue;
        }

        let Some(trade_ref) = trade.trade_ref() else {
            continue;
        };
        let Some(timestamp) = trade.timestamp else {
            continue;
        };

        let id = format!("{}-{}", trade_ref, timestamp);
        if !seen.insert(id.clone()) {
            continue;
        }

        qualified.push(QualifiedTrade { trade, value, id });
    }

    qualified
}

/// Enrichment steps that need no network: index lookup by identifier, then
/// synthesis from metadata some upstream shapes inline on the trade itself.
pub fn resolve_local(index: &EventIndex, trade: &RawTrade) -> Option<EventMetadata> {
    if let Some(id) = trade.identifier() {
        if let Some(meta) = index.lookup(id) {
            return Some((*meta).clone());
        }
    }

    match (trade.title.as_deref(), trade.embedded_slug()) {
        (Some(title), Some(slug)) if !title.is_empty() => Some(EventMetadata {
            title: title.to_string(),
            slug: slug.to_string(),
            category: "Market".to_string(),
            icon: trade.icon.clone(),
        }),
        _ => None,
    }
}

fn build_alert(qualified: QualifiedTrade, meta: EventMetadata) -> WhaleAlert {
    let QualifiedTrade { trade, value, id } = qualified;

    WhaleAlert {
        id,
        market_id: trade.identifier().unwrap_or("unknown").to_string(),
        wallet_address: trade.wallet_address().to_string(),
        amount: value,
        side: Side::from_outcome(trade.outcome.as_deref()),
        price: trade.price.unwrap_or(dec!(0.5)),
        timestamp: trade.timestamp.unwrap_or_default(),
        market_url: market_url(&meta.slug),
        market_title: meta.title,
        market_slug: meta.slug,
        icon: meta.icon,
        category: meta.category,
    }
}

/// The full ingestion pipeline, run once per polling cycle
pub struct WhalePipeline {
    clob: ClobClient,
    gamma: GammaClient,
    min_whale_usd: Decimal,
    trade_batches: usize,
    trade_page_size: usize,
    events_limit: usize,
}

impl WhalePipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            clob: ClobClient::new(config.clob_credentials.clone()),
            gamma: GammaClient::new(),
            min_whale_usd: config.min_whale_usd,
            trade_batches: config.trade_batches,
            trade_page_size: config.trade_page_size,
            events_limit: config.events_limit,
        }
    }

    /// Run one cycle: rebuild the metadata index, ingest trades, filter,
    /// enrich, and return the batch sorted newest first. Upstream failures
    /// degrade to partial or empty output; this never errors.
    pub async fn run(&self) -> Vec<WhaleAlert> {
        let events = match self.gamma.fetch_events(self.events_limit).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Events fetch failed, continuing without index: {}", e);
                Vec::new()
            }
        };
        let mut index = EventIndex::from_events(&events);

        let trades = self
            .clob
            .fetch_trades(self.trade_batches, self.trade_page_size)
            .await;
        let total = trades.len();
        let qualified = qualify(trades, self.min_whale_usd);
        info!(
            "{} of {} trades above ${} threshold",
            qualified.len(),
            total,
            self.min_whale_usd
        );

        // Distinct identifiers that neither the index nor embedded metadata
        // resolve; each gets exactly one network lookup per cycle
        let mut misses: Vec<String> = Vec::new();
        let mut miss_seen: HashSet<&str> = HashSet::new();
        for q in &qualified {
            if resolve_local(&index, &q.trade).is_some() {
                continue;
            }
            if let Some(id) = q.trade.identifier() {
                if miss_seen.insert(id) {
                    misses.push(id.to_string());
                }
            }
        }

        if !misses.is_empty() {
            debug!("Fallback metadata lookups for {} condition ids", misses.len());
            let gamma = &self.gamma;
            let results: Vec<(String, Option<EventMetadata>)> = stream::iter(misses)
                .map(|id| async move {
                    let meta = match timeout(FALLBACK_TIMEOUT, gamma.fetch_event_by_condition(&id)).await {
                        Ok(Ok(meta)) => meta,
                        Ok(Err(e)) => {
                            debug!("Fallback lookup for {} failed: {}", id, e);
                            None
                        }
                        Err(_) => {
                            debug!("Fallback lookup for {} timed out", id);
                            None
                        }
                    };
                    (id, meta)
                })
                .buffer_unordered(FALLBACK_CONCURRENCY)
                .collect()
                .await;

            for (id, meta) in results {
                if let Some(meta) = meta {
                    index.insert(id, meta);
                }
            }
        }

        let mut alerts = Vec::new();
        for q in qualified {
            // Trades that still resolve nowhere are dropped, never emitted
            // with placeholder metadata
            let Some(meta) = resolve_local(&index, &q.trade) else {
                continue;
            };
            alerts.push(build_alert(q, meta));
            if alerts.len() >= MAX_BATCH {
                break;
            }
        }

        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        info!("Pipeline produced {} whale alerts", alerts.len());
        alerts
    }
}
