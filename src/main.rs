//! Whale Alert Aggregator CLI
//!
//! Scan the trade feed for whale alerts, watch it continuously, or read the
//! stored history.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;
use whalewatch::{
    notify::time_ago, AlertStore, Config, Database, MemoryStore, Side, TimeWindow, WhaleAlert,
    WhalePipeline,
};

#[derive(Parser)]
#[command(name = "whalewatch")]
#[command(about = "Whale alert aggregator for prediction markets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion cycle and print the whale alerts found
    Scan {
        /// Maximum number of alerts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Override the whale threshold in USD
        #[arg(short, long)]
        min_usd: Option<Decimal>,
    },

    /// Poll continuously and print fresh alerts as they appear
    Watch {
        /// Poll interval in seconds
        #[arg(short, long, default_value = "15")]
        interval: u64,

        /// Override the whale threshold in USD
        #[arg(short, long)]
        min_usd: Option<Decimal>,
    },

    /// Show the stored alert history
    History {
        /// Maximum number of alerts to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Display window: 10m, 1h, 24h, or 7d
        #[arg(short, long)]
        window: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Scan { limit, min_usd } => {
            if let Some(min_usd) = min_usd {
                config.min_whale_usd = min_usd;
            }
            scan(&config, limit).await?;
        }
        Commands::Watch { interval, min_usd } => {
            if let Some(min_usd) = min_usd {
                config.min_whale_usd = min_usd;
            }
            watch(&config, interval).await?;
        }
        Commands::History { limit, window } => show_history(&config, limit, window).await?,
    }

    Ok(())
}

async fn scan(config: &Config, limit: usize) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  WHALE SCAN - threshold ${}", config.min_whale_usd);
    println!("{}\n", "=".repeat(70));

    let pipeline = WhalePipeline::new(config);
    println!("Fetching trades and event metadata...\n");

    let alerts = pipeline.run().await;
    print_alerts(&alerts, limit);

    println!("{}", "-".repeat(70));
    println!("Total: {} whale alerts this cycle", alerts.len());

    Ok(())
}

async fn watch(config: &Config, interval: u64) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!(
        "  WATCH MODE - threshold ${} | every {}s",
        config.min_whale_usd, interval
    );
    println!("{}\n", "=".repeat(70));

    let pipeline = WhalePipeline::new(config);
    let store = MemoryStore::new(config.history_cap);
    let mut printed: HashSet<String> = HashSet::new();

    println!("Starting poll loop (Ctrl+C to stop)...\n");

    loop {
        let batch = pipeline.run().await;

        match store.merge(&batch).await {
            Ok(outcome) => {
                let fresh: Vec<WhaleAlert> = batch
                    .into_iter()
                    .filter(|a| printed.insert(a.id.clone()))
                    .collect();

                if !fresh.is_empty() {
                    println!(
                        "\n--- {} | {} new, {} in history ---",
                        chrono::Utc::now().format("%H:%M:%S"),
                        fresh.len(),
                        outcome.total
                    );
                    print_alerts(&fresh, 10);
                }
            }
            Err(e) => error!("Merge failed: {}", e),
        }

        // Bound the printed-id set the same way the store bounds history
        if printed.len() > config.history_cap * 2 {
            printed.clear();
        }

        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

async fn show_history(config: &Config, limit: usize, window: Option<String>) -> Result<()> {
    let db = Database::new(&config.database_path, config.history_cap).await?;
    let mut alerts = db.read_alerts(limit).await?;

    let window = window.as_deref().and_then(TimeWindow::parse);
    if let Some(window) = window {
        let now = chrono::Utc::now().timestamp();
        alerts.retain(|a| now - a.timestamp <= window.seconds());
    }

    println!("\n{}", "=".repeat(70));
    match window {
        Some(w) => println!("  ALERT HISTORY - last {}", w),
        None => println!("  ALERT HISTORY"),
    }
    println!("{}\n", "=".repeat(70));

    print_alerts(&alerts, limit);
    Ok(())
}

fn print_alerts(alerts: &[WhaleAlert], limit: usize) {
    if alerts.is_empty() {
        println!("No whale alerts found.\n");
        return;
    }

    let now = chrono::Utc::now().timestamp();

    for (i, alert) in alerts.iter().take(limit).enumerate() {
        let side = match alert.side {
            Side::Yes => "YES".green(),
            Side::No => "NO".red(),
        };
        let amount = format!("${}", alert.amount.round()).bold();
        let price_cents = (alert.price * Decimal::from(100)).round();

        println!("\n{}. \"{}\"", i + 1, short_title(&alert.market_title, 60));
        println!(
            "   {} {} at {}c | {} | {}",
            amount,
            side,
            price_cents,
            alert.category,
            time_ago(alert.timestamp, now)
        );
        println!("   {} | {}", short_title(&alert.wallet_address, 16), alert.market_url);
    }

    if alerts.len() > limit {
        println!("\n   ... and {} more", alerts.len() - limit);
    }

    println!();
}

/// Shorten for display, respecting UTF-8 boundaries
fn short_title(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        text.to_string()
    } else {
        let truncated: String = chars[..max_len.saturating_sub(3)].iter().collect();
        format!("{}...", truncated)
    }
}
