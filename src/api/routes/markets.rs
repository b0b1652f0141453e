//! Market data passthrough endpoints
//!
//! Thin aggregation over the upstream listing endpoints. Upstream failures
//! degrade to empty lists; the feed never surfaces a raw error.

use crate::api::server::AppState;
use crate::data::{LeaderboardRow, PositionRow};
use crate::gamma::{event_category, parse_outcome_prices, GammaEvent};
use crate::types::market_url;
use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A market row for listing pages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub volume: Decimal,
    pub liquidity: Decimal,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarketsQuery {
    pub limit: Option<usize>,
}

/// GET /api/markets - trending markets from the events listing
pub async fn list_markets(
    State(state): State<AppState>,
    Query(query): Query<MarketsQuery>,
) -> Json<Vec<MarketSummary>> {
    let limit = query.limit.unwrap_or(50).min(100);

    let events = match state.gamma.fetch_events(limit).await {
        Ok(events) => events,
        Err(e) => {
            warn!("Markets listing fetch failed: {}", e);
            return Json(Vec::new());
        }
    };

    let markets = events.iter().filter_map(event_to_summary).collect();
    Json(markets)
}

fn event_to_summary(event: &GammaEvent) -> Option<MarketSummary> {
    let market = event.markets.as_ref()?.first()?;
    let title = event
        .title
        .clone()
        .or_else(|| event.question.clone())
        .filter(|s| !s.is_empty())?;
    let slug = event.slug.as_deref().filter(|s| !s.is_empty())?;

    let (yes_price, no_price) =
        parse_outcome_prices(&market.outcome_prices).unwrap_or((dec!(0.5), dec!(0.5)));

    Some(MarketSummary {
        id: event.id.clone().unwrap_or_else(|| slug.to_string()),
        title,
        category: event_category(event),
        yes_price,
        no_price,
        volume: market.volume24hr.or(event.volume24hr).unwrap_or_default(),
        liquidity: market.liquidity.or(event.liquidity).unwrap_or_default(),
        url: market_url(slug),
        icon: event.icon.clone().or_else(|| event.image.clone()),
        end_date: event.end_date.clone(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// day, week, month, or all
    pub window: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/leaderboard - PnL leaderboard passthrough
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardRow>> {
    let window = query.window.as_deref().unwrap_or("all");
    let limit = query.limit.unwrap_or(50).min(100);

    match state.data.fetch_leaderboard(window, limit).await {
        Ok(rows) => Json(rows),
        Err(e) => {
            warn!("Leaderboard fetch failed: {}", e);
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PositionsQuery {
    pub user: String,
}

/// GET /api/positions - open positions for a wallet
pub async fn get_positions(
    State(state): State<AppState>,
    Query(query): Query<PositionsQuery>,
) -> Json<Vec<PositionRow>> {
    match state.data.fetch_positions(&query.user).await {
        Ok(positions) => Json(positions),
        Err(e) => {
            warn!("Positions fetch failed for {}: {}", query.user, e);
            Json(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamma::GammaMarket;

    #[test]
    fn test_event_to_summary_maps_prices_and_url() {
        let event = GammaEvent {
            id: Some("42".to_string()),
            title: Some("Big event".to_string()),
            slug: Some("big-event".to_string()),
            markets: Some(vec![GammaMarket {
                outcome_prices: Some(r#"["0.65", "0.35"]"#.to_string()),
                volume24hr: Some(dec!(120000)),
                liquidity: Some(dec!(30000)),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let summary = event_to_summary(&event).unwrap();
        assert_eq!(summary.id, "42");
        assert_eq!(summary.yes_price, dec!(0.65));
        assert_eq!(summary.no_price, dec!(0.35));
        assert_eq!(summary.url, "https://polymarket.com/event/big-event");
        assert_eq!(summary.volume, dec!(120000));
    }

    #[test]
    fn test_event_to_summary_skips_events_without_markets_or_slug() {
        let no_markets = GammaEvent {
            title: Some("Empty".to_string()),
            slug: Some("empty".to_string()),
            ..Default::default()
        };
        assert!(event_to_summary(&no_markets).is_none());

        let no_slug = GammaEvent {
            title: Some("No slug".to_string()),
            markets: Some(vec![GammaMarket::default()]),
            ..Default::default()
        };
        assert!(event_to_summary(&no_slug).is_none());
    }

    #[test]
    fn test_event_to_summary_defaults_unparseable_prices() {
        let event = GammaEvent {
            title: Some("Event".to_string()),
            slug: Some("event".to_string()),
            markets: Some(vec![GammaMarket::default()]),
            ..Default::default()
        };
        let summary = event_to_summary(&event).unwrap();
        assert_eq!(summary.yes_price, dec!(0.5));
        assert_eq!(summary.no_price, dec!(0.5));
    }
}
