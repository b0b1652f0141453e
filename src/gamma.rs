//! Gamma API client for event and market display metadata

use crate::config::GammaApi;
use crate::types::{de_flex_decimal, de_flex_string, EventMetadata};
use anyhow::{Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// Raw event from the Gamma API. Parent of markets; carries the display
/// metadata the trade feed lacks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GammaEvent {
    #[serde(deserialize_with = "de_flex_string")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub question: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<GammaTag>>,
    pub markets: Option<Vec<GammaMarket>>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub volume24hr: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub liquidity: Option<Decimal>,
    pub end_date: Option<String>,
}

/// Tags arrive either as objects with a label or as bare strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GammaTag {
    Labeled {
        #[serde(default)]
        label: Option<String>,
    },
    Bare(String),
}

impl GammaTag {
    pub fn label(&self) -> Option<&str> {
        match self {
            GammaTag::Labeled { label } => label.as_deref(),
            GammaTag::Bare(s) => Some(s.as_str()),
        }
    }
}

/// Raw market within an event. Up to four identifier variants may refer to it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GammaMarket {
    #[serde(deserialize_with = "de_flex_string")]
    pub id: Option<String>,
    #[serde(alias = "condition_id")]
    pub condition_id: Option<String>,
    #[serde(alias = "asset_id")]
    pub asset_id: Option<String>,
    /// JSON-stringified array of CLOB token ids
    #[serde(alias = "clob_token_ids")]
    pub clob_token_ids: Option<String>,
    /// JSON-stringified pair of decimal strings
    #[serde(alias = "outcome_prices")]
    pub outcome_prices: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub volume24hr: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub liquidity: Option<Decimal>,
    /// Parent events, present on the by-condition markets endpoint
    pub events: Option<Vec<GammaEvent>>,
}

/// Category for an event: first tag label, then the category field
pub fn event_category(event: &GammaEvent) -> String {
    event
        .tags
        .as_ref()
        .and_then(|tags| tags.first())
        .and_then(|t| t.label())
        .map(str::to_string)
        .or_else(|| event.category.clone())
        .unwrap_or_else(|| "Other".to_string())
}

/// Derive the shared display metadata for an event, falling back to
/// market-level icons when the event has none. Returns `None` when the event
/// lacks a title or slug, since such metadata could never produce a
/// resolvable alert.
pub fn event_metadata(event: &GammaEvent, market: Option<&GammaMarket>) -> Option<EventMetadata> {
    let title = event
        .title
        .as_deref()
        .or(event.question.as_deref())
        .filter(|s| !s.is_empty())?;
    let slug = event.slug.as_deref().filter(|s| !s.is_empty())?;

    let icon = event
        .icon
        .clone()
        .or_else(|| event.image.clone())
        .or_else(|| market.and_then(|m| m.icon.clone()))
        .or_else(|| market.and_then(|m| m.image.clone()));

    Some(EventMetadata {
        title: title.to_string(),
        slug: slug.to_string(),
        category: event_category(event),
        icon,
    })
}

/// Parse outcome prices from their JSON-stringified encoding
pub fn parse_outcome_prices(prices_str: &Option<String>) -> Option<(Decimal, Decimal)> {
    let prices_str = prices_str.as_ref()?;

    if let Ok(prices) = serde_json::from_str::<Vec<String>>(prices_str) {
        if prices.len() >= 2 {
            let yes = Decimal::from_str(&prices[0]).ok()?;
            let no = Decimal::from_str(&prices[1]).ok()?;
            return Some((yes, no));
        }
    }

    if let Ok(prices) = serde_json::from_str::<Vec<f64>>(prices_str) {
        if prices.len() >= 2 {
            let yes = Decimal::try_from(prices[0]).ok()?;
            let no = Decimal::try_from(prices[1]).ok()?;
            return Some((yes, no));
        }
    }

    None
}

/// Parse CLOB token ids from their JSON-stringified encoding
pub fn parse_token_ids(ids_str: &Option<String>) -> Vec<String> {
    let Some(ids_str) = ids_str else {
        return Vec::new();
    };

    serde_json::from_str::<Vec<String>>(ids_str).unwrap_or_default()
}

/// Client for the Gamma metadata endpoints
pub struct GammaClient {
    client: Client,
}

impl GammaClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(8))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch the active events listing, highest 24h volume first
    pub async fn fetch_events(&self, limit: usize) -> Result<Vec<GammaEvent>> {
        let url = format!(
            "{}?limit={}&active=true&closed=false&order=volume24hr&ascending=false",
            GammaApi::events_url(),
            limit
        );

        debug!("Fetching events from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch events")?;

        if !response.status().is_success() {
            anyhow::bail!("Events API error: {}", response.status());
        }

        let events: Vec<GammaEvent> = response
            .json()
            .await
            .context("Failed to parse events response")?;

        debug!("Fetched {} events", events.len());
        Ok(events)
    }

    /// On-demand metadata lookup by condition id, used when the prebuilt
    /// index misses. A market without a parent event yields `None`.
    pub async fn fetch_event_by_condition(&self, condition_id: &str) -> Result<Option<EventMetadata>> {
        let url = format!("{}?condition_id={}", GammaApi::markets_url(), condition_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch market by condition id")?;

        if !response.status().is_success() {
            anyhow::bail!("Markets API error: {}", response.status());
        }

        let markets: Vec<GammaMarket> = response
            .json()
            .await
            .context("Failed to parse markets response")?;

        let Some(market) = markets.first() else {
            return Ok(None);
        };

        let metadata = market
            .events
            .as_ref()
            .and_then(|events| events.first())
            .and_then(|event| event_metadata(event, Some(market)));

        Ok(metadata)
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_outcome_prices() {
        let prices = Some(r#"["0.65", "0.35"]"#.to_string());
        let (yes, no) = parse_outcome_prices(&prices).unwrap();
        assert_eq!(yes, dec!(0.65));
        assert_eq!(no, dec!(0.35));

        let prices = Some(r#"[0.7, 0.3]"#.to_string());
        let (yes, no) = parse_outcome_prices(&prices).unwrap();
        assert_eq!(yes, dec!(0.7));
        assert_eq!(no, dec!(0.3));

        assert!(parse_outcome_prices(&Some("garbage".to_string())).is_none());
        assert!(parse_outcome_prices(&None).is_none());
    }

    #[test]
    fn test_parse_token_ids() {
        let ids = Some(r#"["111", "222"]"#.to_string());
        assert_eq!(parse_token_ids(&ids), vec!["111", "222"]);
        assert!(parse_token_ids(&Some("not json".to_string())).is_empty());
        assert!(parse_token_ids(&None).is_empty());
    }

    #[test]
    fn test_event_metadata_icon_fallback() {
        let market = GammaMarket {
            icon: Some("market-icon.png".to_string()),
            ..Default::default()
        };
        let event = GammaEvent {
            title: Some("Event".to_string()),
            slug: Some("event".to_string()),
            ..Default::default()
        };

        let meta = event_metadata(&event, Some(&market)).unwrap();
        assert_eq!(meta.icon.as_deref(), Some("market-icon.png"));

        let event_with_icon = GammaEvent {
            icon: Some("event-icon.png".to_string()),
            ..event
        };
        let meta = event_metadata(&event_with_icon, Some(&market)).unwrap();
        assert_eq!(meta.icon.as_deref(), Some("event-icon.png"));
    }

    #[test]
    fn test_event_metadata_requires_title_and_slug() {
        let no_slug = GammaEvent {
            title: Some("Event".to_string()),
            ..Default::default()
        };
        assert!(event_metadata(&no_slug, None).is_none());

        let no_title = GammaEvent {
            slug: Some("event".to_string()),
            ..Default::default()
        };
        assert!(event_metadata(&no_title, None).is_none());

        let question_only = GammaEvent {
            question: Some("Will it?".to_string()),
            slug: Some("will-it".to_string()),
            ..Default::default()
        };
        let meta = event_metadata(&question_only, None).unwrap();
        assert_eq!(meta.title, "Will it?");
    }

    #[test]
    fn test_category_from_tags_or_field() {
        let event = GammaEvent {
            tags: Some(vec![GammaTag::Labeled {
                label: Some("Politics".to_string()),
            }]),
            category: Some("Ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(event_category(&event), "Politics");

        let event = GammaEvent {
            tags: Some(vec![GammaTag::Bare("Sports".to_string())]),
            ..Default::default()
        };
        assert_eq!(event_category(&event), "Sports");

        let event = GammaEvent {
            category: Some("Crypto".to_string()),
            ..Default::default()
        };
        assert_eq!(event_category(&event), "Crypto");

        assert_eq!(event_category(&GammaEvent::default()), "Other");
    }
}
