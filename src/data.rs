//! Data API client for leaderboard and positions-by-wallet lookups

use crate::config::DataApi;
use crate::types::{de_flex_decimal, de_flex_int};
use anyhow::{Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Positions are cached briefly to avoid redundant upstream hits
const POSITIONS_CACHE_TTL: Duration = Duration::from_secs(300);

/// Normalized leaderboard row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: i64,
    pub address: String,
    pub username: String,
    pub pnl: Decimal,
    pub volume: Decimal,
}

/// Upstream leaderboard entry; field names vary between deployments
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawLeaderboardEntry {
    #[serde(alias = "rankScore", deserialize_with = "de_flex_int")]
    rank: Option<i64>,
    #[serde(alias = "address")]
    proxy_wallet: Option<String>,
    #[serde(alias = "name", alias = "username")]
    user_name: Option<String>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pnl: Option<Decimal>,
    #[serde(alias = "volume", deserialize_with = "de_flex_decimal")]
    vol: Option<Decimal>,
}

/// One open position, passed through with light normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionRow {
    pub asset: Option<String>,
    #[serde(alias = "condition_id")]
    pub condition_id: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub size: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub avg_price: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub cur_price: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub current_value: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub cash_pnl: Option<Decimal>,
}

/// Client for the Data API endpoints
pub struct DataApiClient {
    client: Client,
    positions_cache: Mutex<HashMap<String, (Instant, Vec<PositionRow>)>>,
}

impl DataApiClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(8))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            positions_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the PnL leaderboard for a time period (day, week, month, all)
    pub async fn fetch_leaderboard(&self, window: &str, limit: usize) -> Result<Vec<LeaderboardRow>> {
        let window = match window {
            "day" | "week" | "month" | "all" => window,
            _ => "all",
        };

        let url = format!(
            "{}?timePeriod={}&orderBy=PNL&limit={}",
            DataApi::leaderboard_url(),
            window,
            limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch leaderboard")?;

        if !response.status().is_success() {
            anyhow::bail!("Leaderboard API error: {}", response.status());
        }

        let raw: Vec<RawLeaderboardEntry> = response
            .json()
            .await
            .context("Failed to parse leaderboard response")?;

        let rows = raw
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let address = entry.proxy_wallet?;
                Some(LeaderboardRow {
                    rank: entry.rank.unwrap_or(i as i64 + 1),
                    address,
                    username: entry.user_name.unwrap_or_else(|| "Anonymous".to_string()),
                    pnl: entry.pnl.unwrap_or_default(),
                    volume: entry.vol.unwrap_or_default(),
                })
            })
            .collect();

        Ok(rows)
    }

    /// Fetch open positions for a wallet, served from the short-TTL cache
    /// when fresh
    pub async fn fetch_positions(&self, user: &str) -> Result<Vec<PositionRow>> {
        {
            let cache = self.positions_cache.lock().await;
            if let Some((fetched_at, positions)) = cache.get(user) {
                if fetched_at.elapsed() < POSITIONS_CACHE_TTL {
                    debug!("Positions cache hit for {}", user);
                    return Ok(positions.clone());
                }
            }
        }

        let url = format!(
            "{}?user={}&sortBy=CURRENT&sizeThreshold=.01&limit=500",
            DataApi::positions_url(),
            user
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch positions")?;

        if !response.status().is_success() {
            anyhow::bail!("Positions API error: {}", response.status());
        }

        let positions: Vec<PositionRow> = response
            .json()
            .await
            .context("Failed to parse positions response")?;

        let mut cache = self.positions_cache.lock().await;
        cache.insert(user.to_string(), (Instant::now(), positions.clone()));

        Ok(positions)
    }
}

impl Default for DataApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_leaderboard_entry_aliases() {
        let json = r#"{"proxyWallet": "0xabc", "userName": "trader", "pnl": "1234.5", "vol": 99000.0, "rank": 3}"#;
        let entry: RawLeaderboardEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.proxy_wallet.as_deref(), Some("0xabc"));
        assert_eq!(entry.user_name.as_deref(), Some("trader"));
        assert_eq!(entry.pnl, Some(dec!(1234.5)));
        assert_eq!(entry.vol, Some(dec!(99000)));
        assert_eq!(entry.rank, Some(3));

        let json = r#"{"address": "0xdef", "name": "other", "volume": "5"}"#;
        let entry: RawLeaderboardEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.proxy_wallet.as_deref(), Some("0xdef"));
        assert_eq!(entry.user_name.as_deref(), Some("other"));
        assert_eq!(entry.vol, Some(dec!(5)));
    }

    #[test]
    fn test_position_row_parses_mixed_encodings() {
        let json = r#"{
            "asset": "123",
            "conditionId": "0xc",
            "title": "Some market",
            "size": "100.5",
            "avgPrice": 0.45,
            "currentValue": "55.2",
            "cashPnl": -3.1
        }"#;
        let row: PositionRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.condition_id.as_deref(), Some("0xc"));
        assert_eq!(row.size, Some(dec!(100.5)));
        assert_eq!(row.cash_pnl, Some(dec!(-3.1)));
    }
}
