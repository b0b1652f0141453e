//! Axum server setup and configuration

use crate::api::routes;
use crate::config::Config;
use crate::data::DataApiClient;
use crate::db::Database;
use crate::gamma::GammaClient;
use crate::notify::Notifier;
use crate::pipeline::WhalePipeline;
use crate::types::WhaleAlert;
use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub pipeline: Arc<WhalePipeline>,
    pub notifier: Arc<Notifier>,
    pub gamma: Arc<GammaClient>,
    pub data: Arc<DataApiClient>,
}

/// Outcome of one full ingestion cycle
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CycleOutcome {
    pub fetched: usize,
    pub added: usize,
    pub total: usize,
    pub notified: usize,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.database_path, config.history_cap).await?;
        let pipeline = WhalePipeline::new(&config);
        let notifier = Notifier::new(&config);

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            pipeline: Arc::new(pipeline),
            notifier: Arc::new(notifier),
            gamma: Arc::new(GammaClient::new()),
            data: Arc::new(DataApiClient::new()),
        })
    }

    /// Run the pipeline, merge the batch into the durable store, and notify
    /// subscribers about alerts that were not stored before.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let batch = self.pipeline.run().await;
        let fetched = batch.len();

        // Diff against stored ids so notifications only cover fresh alerts
        let known = self.db.alert_ids().await?;
        let fresh: Vec<WhaleAlert> = batch
            .iter()
            .filter(|a| !known.contains(&a.id))
            .cloned()
            .collect();

        let outcome = self.db.merge_alerts(&batch).await?;

        let mut notified = 0;
        if !fresh.is_empty() {
            let subs = self.db.list_subscriptions().await?;
            if !subs.is_empty() {
                notified = self.notifier.fan_out(&subs, &fresh).await;
            }
        }

        info!(
            "Cycle complete: {} fetched, {} new, {} stored, {} notifications",
            fetched, outcome.added, outcome.total, notified
        );

        Ok(CycleOutcome {
            fetched,
            added: outcome.added,
            total: outcome.total,
            notified,
        })
    }
}

/// Create the Axum application with all routes
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let api_routes = Router::new()
        // Whale alert routes
        .route("/whales", get(routes::whales::fetch_whales))
        .route("/whales/store", post(routes::whales::store_whales))
        .route("/whales/history", get(routes::whales::read_history))
        .route("/cron/fetch", get(routes::whales::cron_fetch))
        // Notification routes
        .route("/notifications/send", post(routes::notifications::send_notification))
        .route(
            "/subscriptions",
            get(routes::notifications::list_subscriptions)
                .post(routes::notifications::create_subscription),
        )
        // Market data routes
        .route("/markets", get(routes::markets::list_markets))
        .route("/leaderboard", get(routes::markets::get_leaderboard))
        .route("/positions", get(routes::markets::get_positions));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
