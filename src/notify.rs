//! Email and Telegram notification dispatch
//!
//! Dispatch failures surface to the immediate caller only; they never feed
//! back into the alert pipeline.

use crate::config::Config;
use crate::db::Subscription;
use crate::types::{Side, WhaleAlert};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{error, info};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Concurrent sends during subscriber fan-out
const FANOUT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("dispatch rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Telegram,
}

/// The slice of an alert the notification templates need
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub amount: Decimal,
    pub market_title: String,
    pub side: Side,
    pub price: Decimal,
    pub market_url: String,
    pub timestamp: i64,
}

impl From<&WhaleAlert> for AlertSummary {
    fn from(alert: &WhaleAlert) -> Self {
        Self {
            amount: alert.amount,
            market_title: alert.market_title.clone(),
            side: alert.side,
            price: alert.price,
            market_url: alert.market_url.clone(),
            timestamp: alert.timestamp,
        }
    }
}

/// Client for the external notification services
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    resend_api_key: Option<String>,
    email_from: String,
    telegram_bot_token: Option<String>,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            telegram_bot_token: config.telegram_bot_token.clone(),
        }
    }

    /// Dispatch one alert on one channel
    pub async fn send(
        &self,
        channel: Channel,
        destination: &str,
        alert: &AlertSummary,
        test: bool,
    ) -> Result<(), NotifyError> {
        match channel {
            Channel::Email => self.send_email(destination, alert, test).await,
            Channel::Telegram => self.send_telegram(destination, alert, test).await,
        }
    }

    async fn send_email(
        &self,
        email: &str,
        alert: &AlertSummary,
        test: bool,
    ) -> Result<(), NotifyError> {
        let Some(api_key) = &self.resend_api_key else {
            return Err(NotifyError::NotConfigured("email service"));
        };

        let subject = if test {
            "Test Alert".to_string()
        } else {
            format!("Whale Alert: ${} Trade", alert.amount.round())
        };

        let payload = json!({
            "from": self.email_from,
            "to": [email],
            "subject": subject,
            "html": email_html(alert, test),
        });

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
        }

        info!("Email alert sent to {}", email);
        Ok(())
    }

    async fn send_telegram(
        &self,
        chat_id: &str,
        alert: &AlertSummary,
        test: bool,
    ) -> Result<(), NotifyError> {
        let Some(bot_token) = &self.telegram_bot_token else {
            return Err(NotifyError::NotConfigured("telegram bot"));
        };

        let payload = json!({
            "chat_id": chat_id,
            "text": telegram_text(alert, test),
            "parse_mode": "Markdown",
            "reply_markup": {
                "inline_keyboard": [[
                    { "text": "View market", "url": alert.market_url }
                ]]
            }
        });

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, bot_token);
        let response = self.client.post(&url).json(&payload).send().await?;

        #[derive(Deserialize)]
        struct TelegramResponse {
            ok: bool,
            #[serde(default)]
            description: Option<String>,
        }

        let body: TelegramResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Rejected(
                body.description.unwrap_or_else(|| "telegram API error".to_string()),
            ));
        }

        info!("Telegram alert sent to chat {}", chat_id);
        Ok(())
    }

    /// Fan out fresh alerts to every matching subscriber, with bounded
    /// concurrency. One failed send never blocks the others. Returns the
    /// number of successful sends.
    pub async fn fan_out(&self, subs: &[Subscription], alerts: &[WhaleAlert]) -> usize {
        let jobs = fanout_jobs(subs, alerts);
        if jobs.is_empty() {
            return 0;
        }

        let sent = AtomicUsize::new(0);
        stream::iter(jobs)
            .for_each_concurrent(FANOUT_CONCURRENCY, |(channel, destination, alert)| {
                let sent = &sent;
                async move {
                    match self.send(channel, &destination, &alert, false).await {
                        Ok(()) => {
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            error!("Notification to {:?} {} failed: {}", channel, destination, e);
                        }
                    }
                }
            })
            .await;

        sent.load(Ordering::Relaxed)
    }
}

/// Plan the fan-out: one job per (subscriber channel, alert at or above the
/// subscriber's threshold)
fn fanout_jobs(
    subs: &[Subscription],
    alerts: &[WhaleAlert],
) -> Vec<(Channel, String, AlertSummary)> {
    let mut jobs = Vec::new();

    for sub in subs {
        for alert in alerts {
            if alert.amount < sub.min_usd {
                continue;
            }
            if let Some(email) = sub.email.as_deref() {
                jobs.push((Channel::Email, email.to_string(), AlertSummary::from(alert)));
            }
            if let Some(chat_id) = sub.telegram_chat_id.as_deref() {
                jobs.push((Channel::Telegram, chat_id.to_string(), AlertSummary::from(alert)));
            }
        }
    }

    jobs
}

fn price_cents(price: Decimal) -> Decimal {
    (price * Decimal::from(100)).round()
}

fn email_html(alert: &AlertSummary, test: bool) -> String {
    let test_note = if test {
        "<p><strong>This is a test notification.</strong> Your alerts are configured correctly.</p>"
    } else {
        ""
    };

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1>Whale Alert{}</h1>
  {}
  <h2>{}</h2>
  <p><strong>Trade amount:</strong> ${}</p>
  <p><strong>Side:</strong> {} @ {}&cent;</p>
  <p><strong>Time:</strong> {}</p>
  <p><a href="{}">View market</a></p>
</div>"#,
        if test { " (Test)" } else { "" },
        test_note,
        alert.market_title,
        alert.amount.round(),
        alert.side,
        price_cents(alert.price),
        time_ago(alert.timestamp, chrono::Utc::now().timestamp()),
        alert.market_url,
    )
}

fn telegram_text(alert: &AlertSummary, test: bool) -> String {
    if test {
        return "*Test Alert*\n\nThis is a test notification. Your alerts are configured correctly."
            .to_string();
    }

    format!(
        "*Whale Alert: ${}*\n\n*Market:* {}\n*Side:* {} @ {}\u{00a2}\n*Time:* {}",
        alert.amount.round(),
        alert.market_title,
        alert.side,
        price_cents(alert.price),
        time_ago(alert.timestamp, chrono::Utc::now().timestamp()),
    )
}

/// Human-readable age of a timestamp
pub fn time_ago(timestamp: i64, now: i64) -> String {
    let seconds = (now - timestamp).max(0);
    if seconds < 60 {
        return format!("{}s ago", seconds);
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::market_url;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn alert(id: &str, amount: Decimal) -> WhaleAlert {
        WhaleAlert {
            id: id.to_string(),
            market_id: "c1".to_string(),
            market_title: "Big market".to_string(),
            market_slug: "big-market".to_string(),
            wallet_address: "0xwallet".to_string(),
            amount,
            side: Side::Yes,
            price: dec!(0.65),
            timestamp: 1700000000,
            market_url: market_url("big-market"),
            icon: None,
            category: "Crypto".to_string(),
        }
    }

    fn sub(id: i64, email: Option<&str>, telegram: Option<&str>, min_usd: Decimal) -> Subscription {
        Subscription {
            id,
            email: email.map(str::to_string),
            telegram_chat_id: telegram.map(str::to_string),
            min_usd,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fanout_respects_subscriber_thresholds() {
        let subs = vec![
            sub(1, Some("a@example.com"), None, dec!(5000)),
            sub(2, None, Some("777"), dec!(20000)),
        ];
        let alerts = vec![alert("small", dec!(6000)), alert("big", dec!(25000))];

        let jobs = fanout_jobs(&subs, &alerts);
        // Subscriber 1 gets both alerts by email, subscriber 2 only the big one
        assert_eq!(jobs.len(), 3);

        let email_jobs: Vec<_> = jobs.iter().filter(|(c, _, _)| *c == Channel::Email).collect();
        assert_eq!(email_jobs.len(), 2);

        let telegram_jobs: Vec<_> = jobs
            .iter()
            .filter(|(c, _, _)| *c == Channel::Telegram)
            .collect();
        assert_eq!(telegram_jobs.len(), 1);
        assert_eq!(telegram_jobs[0].2.amount, dec!(25000));
    }

    #[test]
    fn test_fanout_sends_both_channels_for_dual_subscribers() {
        let subs = vec![sub(1, Some("a@example.com"), Some("777"), dec!(1000))];
        let jobs = fanout_jobs(&subs, &[alert("a", dec!(5000))]);
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_templates_carry_alert_fields() {
        let summary = AlertSummary::from(&alert("a", dec!(25000)));

        let html = email_html(&summary, false);
        assert!(html.contains("Big market"));
        assert!(html.contains("$25000"));
        assert!(html.contains("65"));

        let text = telegram_text(&summary, false);
        assert!(text.contains("Big market"));
        assert!(text.contains("YES"));

        assert!(telegram_text(&summary, true).contains("Test"));
    }

    #[test]
    fn test_time_ago() {
        let now = 1_700_000_000;
        assert_eq!(time_ago(now - 30, now), "30s ago");
        assert_eq!(time_ago(now - 300, now), "5m ago");
        assert_eq!(time_ago(now - 7200, now), "2h ago");
        assert_eq!(time_ago(now - 172800, now), "2d ago");
        assert_eq!(time_ago(now + 50, now), "0s ago");
    }
}
