//! Configuration management for the whale alert aggregator

use anyhow::Result;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Aggregator configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database
    pub database_path: String,

    /// Minimum USD notional for a trade to count as a whale
    pub min_whale_usd: Decimal,

    /// Number of trade pages fetched per ingestion cycle
    pub trade_batches: usize,

    /// Records per trade page
    pub trade_page_size: usize,

    /// Number of events fetched when rebuilding the metadata index
    pub events_limit: usize,

    /// Poll interval in seconds for the background ingestion loop
    pub poll_interval_seconds: u64,

    /// Maximum alerts retained in history
    pub history_cap: usize,

    /// CLOB API credentials for authenticated trade fetches (optional)
    pub clob_credentials: Option<ClobCredentials>,

    /// Resend API key for email notifications (optional)
    pub resend_api_key: Option<String>,

    /// From address for email notifications
    pub email_from: String,

    /// Telegram bot token for chat notifications (optional)
    pub telegram_bot_token: Option<String>,

    /// Bearer secret required by the cron trigger endpoint (optional)
    pub cron_secret: Option<String>,
}

/// CLOB API key triple used for request signing
#[derive(Debug, Clone)]
pub struct ClobCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "whalewatch.db".to_string());

        let min_whale_usd = env::var("MIN_WHALE_USD")
            .ok()
            .and_then(|v| Decimal::from_str(&v).ok())
            .unwrap_or_else(|| Decimal::from(5000));

        let trade_batches = env::var("TRADE_BATCHES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let trade_page_size = env::var("TRADE_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let events_limit = env::var("EVENTS_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let poll_interval_seconds = env::var("POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let history_cap = env::var("HISTORY_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let api_key = env::var("CLOB_API_KEY").ok().filter(|s| !s.is_empty());
        let api_secret = env::var("CLOB_API_SECRET").ok().filter(|s| !s.is_empty());
        let api_passphrase = env::var("CLOB_API_PASSPHRASE").ok().filter(|s| !s.is_empty());

        let clob_credentials = match (api_key, api_secret, api_passphrase) {
            (Some(api_key), Some(api_secret), Some(api_passphrase)) => Some(ClobCredentials {
                api_key,
                api_secret,
                api_passphrase,
            }),
            _ => None,
        };

        let resend_api_key = env::var("RESEND_API_KEY").ok().filter(|s| !s.is_empty());

        let email_from = env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Whale Alerts <alerts@whalewatch.local>".to_string());

        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN").ok().filter(|s| !s.is_empty());

        let cron_secret = env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self {
            database_path,
            min_whale_usd,
            trade_batches,
            trade_page_size,
            events_limit,
            poll_interval_seconds,
            history_cap,
            clob_credentials,
            resend_api_key,
            email_from,
            telegram_bot_token,
            cron_secret,
        })
    }
}

/// Gamma API configuration
pub struct GammaApi;

impl GammaApi {
    pub const BASE_URL: &'static str = "https://gamma-api.polymarket.com";

    pub fn events_url() -> String {
        format!("{}/events", Self::BASE_URL)
    }

    pub fn markets_url() -> String {
        format!("{}/markets", Self::BASE_URL)
    }
}

/// CLOB API configuration
pub struct ClobApi;

impl ClobApi {
    pub const BASE_URL: &'static str = "https://clob.polymarket.com";

    pub const TRADES_PATH: &'static str = "/data/trades";
}

/// Data API configuration
pub struct DataApi;

impl DataApi {
    pub const BASE_URL: &'static str = "https://data-api.polymarket.com";

    pub fn leaderboard_url() -> String {
        format!("{}/v1/leaderboard", Self::BASE_URL)
    }

    pub fn positions_url() -> String {
        format!("{}/positions", Self::BASE_URL)
    }
}
