//! SQLite persistence for alert history and notification subscriptions

use crate::store::{AlertStore, MergeOutcome};
use crate::types::{Side, WhaleAlert};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::info;

/// A notification subscription row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub email: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub min_usd: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
    history_cap: usize,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str, history_cap: usize) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool, history_cap };
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                market_id TEXT NOT NULL,
                market_title TEXT NOT NULL,
                market_slug TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                amount TEXT NOT NULL,
                side TEXT NOT NULL,
                price TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                market_url TEXT NOT NULL,
                icon TEXT,
                category TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT,
                telegram_chat_id TEXT,
                min_usd TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database initialized");
        Ok(())
    }

    /// Merge a batch into the stored history. Insertion is id-keyed and
    /// ignores duplicates, so the operation is idempotent; eviction keeps the
    /// newest `history_cap` entries.
    pub async fn merge_alerts(&self, batch: &[WhaleAlert]) -> Result<MergeOutcome> {
        let mut added = 0usize;

        for alert in batch {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO alerts
                    (id, market_id, market_title, market_slug, wallet_address,
                     amount, side, price, timestamp, market_url, icon, category)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&alert.id)
            .bind(&alert.market_id)
            .bind(&alert.market_title)
            .bind(&alert.market_slug)
            .bind(&alert.wallet_address)
            .bind(alert.amount.to_string())
            .bind(alert.side.to_string())
            .bind(alert.price.to_string())
            .bind(alert.timestamp)
            .bind(&alert.market_url)
            .bind(alert.icon.as_deref())
            .bind(&alert.category)
            .execute(&self.pool)
            .await?;

            added += result.rows_affected() as usize;
        }

        sqlx::query(
            "DELETE FROM alerts WHERE id NOT IN \
             (SELECT id FROM alerts ORDER BY timestamp DESC, id ASC LIMIT ?)",
        )
        .bind(self.history_cap as i64)
        .execute(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await?;

        Ok(MergeOutcome {
            added,
            total: total.0 as usize,
        })
    }

    /// Stored history, most recent first
    pub async fn read_alerts(&self, limit: usize) -> Result<Vec<WhaleAlert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts ORDER BY timestamp DESC, id ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let alerts = rows
            .iter()
            .filter_map(|row| row_to_alert(row).ok())
            .collect();

        Ok(alerts)
    }

    /// Ids currently present in the history, for diffing fresh batches
    pub async fn alert_ids(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM alerts")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // ==================== SUBSCRIPTIONS ====================

    pub async fn add_subscription(
        &self,
        email: Option<&str>,
        telegram_chat_id: Option<&str>,
        min_usd: Decimal,
    ) -> Result<Subscription> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO subscriptions (email, telegram_chat_id, min_usd, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(telegram_chat_id)
        .bind(min_usd.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Subscription {
            id: result.last_insert_rowid(),
            email: email.map(str::to_string),
            telegram_chat_id: telegram_chat_id.map(str::to_string),
            min_usd,
            created_at: now,
        })
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        let subs = rows
            .iter()
            .filter_map(|row| row_to_subscription(row).ok())
            .collect();

        Ok(subs)
    }
}

#[async_trait]
impl AlertStore for Database {
    async fn read(&self, limit: usize) -> Result<Vec<WhaleAlert>> {
        self.read_alerts(limit).await
    }

    async fn merge(&self, batch: &[WhaleAlert]) -> Result<MergeOutcome> {
        self.merge_alerts(batch).await
    }
}

fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> Result<WhaleAlert> {
    let side_str: String = row.get("side");
    let side = match side_str.as_str() {
        "YES" => Side::Yes,
        _ => Side::No,
    };

    let amount_str: String = row.get("amount");
    let price_str: String = row.get("price");

    Ok(WhaleAlert {
        id: row.get("id"),
        market_id: row.get("market_id"),
        market_title: row.get("market_title"),
        market_slug: row.get("market_slug"),
        wallet_address: row.get("wallet_address"),
        amount: Decimal::from_str(&amount_str)?,
        side,
        price: Decimal::from_str(&price_str)?,
        timestamp: row.get("timestamp"),
        market_url: row.get("market_url"),
        icon: row.get("icon"),
        category: row.get("category"),
    })
}

fn row_to_subscription(row: &sqlx::sqlite::SqliteRow) -> Result<Subscription> {
    let min_usd_str: String = row.get("min_usd");
    let created_at_str: String = row.get("created_at");

    Ok(Subscription {
        id: row.get("id"),
        email: row.get("email"),
        telegram_chat_id: row.get("telegram_chat_id"),
        min_usd: Decimal::from_str(&min_usd_str)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::market_url;
    use rust_decimal_macros::dec;

    fn alert(id: &str, timestamp: i64) -> WhaleAlert {
        WhaleAlert {
            id: id.to_string(),
            market_id: "c1".to_string(),
            market_title: "Event".to_string(),
            market_slug: "event".to_string(),
            wallet_address: "0xwallet".to_string(),
            amount: dec!(12500.50),
            side: Side::Yes,
            price: dec!(0.65),
            timestamp,
            market_url: market_url("event"),
            icon: Some("icon.png".to_string()),
            category: "Crypto".to_string(),
        }
    }

    async fn test_db(cap: usize) -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap(), cap).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (_dir, db) = test_db(100).await;

        let batch = vec![alert("a", 100), alert("b", 200)];
        let outcome = db.merge_alerts(&batch).await.unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.total, 2);

        let outcome = db.merge_alerts(&batch).await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.total, 2);
    }

    #[tokio::test]
    async fn test_read_is_newest_first_and_roundtrips() {
        let (_dir, db) = test_db(100).await;

        db.merge_alerts(&[alert("old", 100), alert("new", 300), alert("mid", 200)])
            .await
            .unwrap();

        let history = db.read_alerts(10).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        assert_eq!(history[0].amount, dec!(12500.50));
        assert_eq!(history[0].side, Side::Yes);
        assert_eq!(history[0].icon.as_deref(), Some("icon.png"));
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let (_dir, db) = test_db(3).await;

        let batch: Vec<WhaleAlert> = (0..5).map(|i| alert(&format!("a{}", i), 100 + i)).collect();
        let outcome = db.merge_alerts(&batch).await.unwrap();
        assert_eq!(outcome.total, 3);

        let history = db.read_alerts(10).await.unwrap();
        let timestamps: Vec<i64> = history.iter().map(|a| a.timestamp).collect();
        assert_eq!(timestamps, vec![104, 103, 102]);
    }

    #[tokio::test]
    async fn test_subscription_roundtrip() {
        let (_dir, db) = test_db(100).await;

        db.add_subscription(Some("a@example.com"), None, dec!(5000))
            .await
            .unwrap();
        db.add_subscription(None, Some("12345"), dec!(20000))
            .await
            .unwrap();

        let subs = db.list_subscriptions().await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].email.as_deref(), Some("a@example.com"));
        assert_eq!(subs[0].min_usd, dec!(5000));
        assert_eq!(subs[1].telegram_chat_id.as_deref(), Some("12345"));
    }
}
