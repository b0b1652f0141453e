//! Core types for the whale alert aggregator

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade side, normalized from the free-form upstream `outcome` string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Side {
    /// Anything that is not recognizably "yes" counts as NO
    pub fn from_outcome(outcome: Option<&str>) -> Self {
        match outcome {
            Some(o) if o.eq_ignore_ascii_case("yes") => Side::Yes,
            _ => Side::No,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Display metadata for one event, shared by every identifier of its markets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub title: String,
    pub slug: String,
    pub category: String,
    pub icon: Option<String>,
}

/// A high-value trade enriched with event display metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleAlert {
    /// Stable across fetches: transaction reference + timestamp
    pub id: String,
    pub market_id: String,
    pub market_title: String,
    pub market_slug: String,
    pub wallet_address: String,
    /// USD notional, computed once at ingestion
    pub amount: Decimal,
    pub side: Side,
    pub price: Decimal,
    /// Epoch seconds
    pub timestamp: i64,
    pub market_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub category: String,
}

/// Canonical display URL for an event slug
pub fn market_url(slug: &str) -> String {
    format!("https://polymarket.com/event/{}", slug)
}

/// Raw trade record from the upstream feed. Every field is optional so a
/// malformed record deserializes instead of aborting the batch; numeric fields
/// arrive as either JSON numbers or strings depending on the endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTrade {
    #[serde(alias = "condition_id")]
    pub condition_id: Option<String>,
    pub asset: Option<String>,
    pub market: Option<String>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub size: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub amount: Option<Decimal>,
    #[serde(deserialize_with = "de_flex_decimal")]
    pub price: Option<Decimal>,
    pub outcome: Option<String>,
    #[serde(deserialize_with = "de_flex_int")]
    pub timestamp: Option<i64>,
    #[serde(alias = "proxy_wallet")]
    pub proxy_wallet: Option<String>,
    pub taker: Option<String>,
    pub maker: Option<String>,
    #[serde(alias = "transaction_hash")]
    pub transaction_hash: Option<String>,
    pub id: Option<String>,
    // Some upstream shapes inline display metadata on the trade itself
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(alias = "event_slug")]
    pub event_slug: Option<String>,
    pub icon: Option<String>,
}

impl RawTrade {
    /// The ordered identifier candidates a trade may carry. All join logic
    /// goes through this single function.
    pub fn identifier(&self) -> Option<&str> {
        self.condition_id
            .as_deref()
            .or(self.asset.as_deref())
            .or(self.market.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Transaction reference used to build the stable alert id
    pub fn trade_ref(&self) -> Option<&str> {
        self.transaction_hash
            .as_deref()
            .or(self.id.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Trader address, first present field wins
    pub fn wallet_address(&self) -> &str {
        self.proxy_wallet
            .as_deref()
            .or(self.taker.as_deref())
            .or(self.maker.as_deref())
            .unwrap_or("unknown")
    }

    /// Embedded slug, if the upstream shape inlines one
    pub fn embedded_slug(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .or(self.event_slug.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Read-time display window applied against `now - timestamp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    TenMinutes,
    OneHour,
    OneDay,
    OneWeek,
}

impl TimeWindow {
    pub fn seconds(self) -> i64 {
        match self {
            TimeWindow::TenMinutes => 600,
            TimeWindow::OneHour => 3600,
            TimeWindow::OneDay => 86400,
            TimeWindow::OneWeek => 604800,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "10m" => Some(TimeWindow::TenMinutes),
            "1h" => Some(TimeWindow::OneHour),
            "24h" => Some(TimeWindow::OneDay),
            "7d" => Some(TimeWindow::OneWeek),
            _ => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::TenMinutes => write!(f, "10m"),
            TimeWindow::OneHour => write!(f, "1h"),
            TimeWindow::OneDay => write!(f, "24h"),
            TimeWindow::OneWeek => write!(f, "7d"),
        }
    }
}

/// Accept a decimal encoded as a JSON number or a string
pub(crate) fn de_flex_decimal<'de, D>(de: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<Flex>::deserialize(de)? {
        Some(Flex::Num(n)) => Decimal::try_from(n).ok(),
        Some(Flex::Str(s)) => Decimal::from_str(&s).ok(),
        None => None,
    })
}

/// Accept an integer encoded as a JSON integer, float, or string
pub(crate) fn de_flex_int<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Int(i64),
        Num(f64),
        Str(String),
    }

    Ok(match Option::<Flex>::deserialize(de)? {
        Some(Flex::Int(n)) => Some(n),
        Some(Flex::Num(n)) => Some(n as i64),
        Some(Flex::Str(s)) => s.parse().ok(),
        None => None,
    })
}

/// Accept an id encoded as a JSON string or number
pub(crate) fn de_flex_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flex {
        Str(String),
        Num(i64),
    }

    Ok(match Option::<Flex>::deserialize(de)? {
        Some(Flex::Str(s)) => Some(s),
        Some(Flex::Num(n)) => Some(n.to_string()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_trade_with_string_numbers() {
        let json = r#"{
            "conditionId": "0xabc",
            "size": "1000",
            "price": "0.5",
            "outcome": "Yes",
            "timestamp": 1700000000,
            "proxyWallet": "0xwallet",
            "transactionHash": "0xtx"
        }"#;

        let trade: RawTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.identifier(), Some("0xabc"));
        assert_eq!(trade.size, Some(dec!(1000)));
        assert_eq!(trade.price, Some(dec!(0.5)));
        assert_eq!(trade.wallet_address(), "0xwallet");
        assert_eq!(trade.trade_ref(), Some("0xtx"));
    }

    #[test]
    fn test_parse_trade_with_numeric_fields_and_snake_case() {
        let json = r#"{
            "condition_id": "0xdef",
            "size": 250.5,
            "price": 0.42,
            "timestamp": "1700000001",
            "maker": "0xmaker"
        }"#;

        let trade: RawTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.identifier(), Some("0xdef"));
        assert_eq!(trade.size, Some(dec!(250.5)));
        assert_eq!(trade.timestamp, Some(1700000001));
        assert_eq!(trade.wallet_address(), "0xmaker");
    }

    #[test]
    fn test_identifier_candidate_order() {
        let trade = RawTrade {
            asset: Some("asset-1".to_string()),
            market: Some("market-1".to_string()),
            ..Default::default()
        };
        assert_eq!(trade.identifier(), Some("asset-1"));

        let trade = RawTrade {
            condition_id: Some("cond-1".to_string()),
            asset: Some("asset-1".to_string()),
            ..Default::default()
        };
        assert_eq!(trade.identifier(), Some("cond-1"));

        let trade = RawTrade {
            market: Some("market-1".to_string()),
            ..Default::default()
        };
        assert_eq!(trade.identifier(), Some("market-1"));

        assert_eq!(RawTrade::default().identifier(), None);
    }

    #[test]
    fn test_side_normalization() {
        assert_eq!(Side::from_outcome(Some("Yes")), Side::Yes);
        assert_eq!(Side::from_outcome(Some("YES")), Side::Yes);
        assert_eq!(Side::from_outcome(Some("No")), Side::No);
        assert_eq!(Side::from_outcome(Some("Up")), Side::No);
        assert_eq!(Side::from_outcome(None), Side::No);
    }

    #[test]
    fn test_window_parse() {
        assert_eq!(TimeWindow::parse("10M"), Some(TimeWindow::TenMinutes));
        assert_eq!(TimeWindow::parse("1h"), Some(TimeWindow::OneHour));
        assert_eq!(TimeWindow::parse("24H"), Some(TimeWindow::OneDay));
        assert_eq!(TimeWindow::parse("7d"), Some(TimeWindow::OneWeek));
        assert_eq!(TimeWindow::parse("3h"), None);
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = WhaleAlert {
            id: "0xtx-1700000000".to_string(),
            market_id: "0xabc".to_string(),
            market_title: "Will it happen?".to_string(),
            market_slug: "will-it-happen".to_string(),
            wallet_address: "0xwallet".to_string(),
            amount: dec!(12500),
            side: Side::Yes,
            price: dec!(0.65),
            timestamp: 1700000000,
            market_url: market_url("will-it-happen"),
            icon: None,
            category: "Crypto".to_string(),
        };

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["marketSlug"], "will-it-happen");
        assert_eq!(json["side"], "YES");
        assert_eq!(json["marketUrl"], "https://polymarket.com/event/will-it-happen");

        let back: WhaleAlert = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, alert.id);
        assert_eq!(back.amount, alert.amount);
    }
}
