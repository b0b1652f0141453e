//! Whale alert API endpoints

use crate::api::routes::ErrorResponse;
use crate::api::server::{AppState, CycleOutcome};
use crate::store::{filter_window, MergeOutcome};
use crate::types::{TimeWindow, WhaleAlert};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;

/// GET /api/whales - run the pipeline and return the enriched batch
pub async fn fetch_whales(State(state): State<AppState>) -> Json<Vec<WhaleAlert>> {
    // The pipeline is best-effort; upstream failures yield a smaller batch,
    // never an error
    Json(state.pipeline.run().await)
}

/// POST /api/whales/store - merge a batch into the bounded history
pub async fn store_whales(
    State(state): State<AppState>,
    Json(batch): Json<Vec<WhaleAlert>>,
) -> Result<Json<MergeOutcome>, (StatusCode, Json<ErrorResponse>)> {
    match state.db.merge_alerts(&batch).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            error!("Failed to store alerts: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to store alerts")),
            ))
        }
    }
}

/// Query parameters for reading history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of alerts to return
    pub limit: Option<usize>,
    /// Display window: 10m, 1h, 24h, or 7d
    pub window: Option<String>,
}

/// GET /api/whales/history - the stored history, most recent first
pub async fn read_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WhaleAlert>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(100).min(state.config.history_cap);

    let mut alerts = match state.db.read_alerts(limit).await {
        Ok(alerts) => alerts,
        Err(e) => {
            error!("Failed to read alert history: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to read alert history")),
            ));
        }
    };

    if let Some(window) = query.window.as_deref().and_then(TimeWindow::parse) {
        alerts = filter_window(&alerts, window, Utc::now().timestamp());
    }

    Ok(Json(alerts))
}

/// GET /api/cron/fetch - scheduled trigger that keeps the store warm and
/// dispatches subscriber notifications for fresh alerts
pub async fn cron_fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CycleOutcome>, (StatusCode, Json<ErrorResponse>)> {
    if let Some(secret) = &state.config.cron_secret {
        let expected = format!("Bearer {}", secret);
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false);

        if !authorized {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized")),
            ));
        }
    }

    match state.run_cycle().await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            error!("Cron cycle failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Cron cycle failed")),
            ))
        }
    }
}
