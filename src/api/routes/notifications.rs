//! Notification dispatch and subscription endpoints

use crate::api::routes::ErrorResponse;
use crate::api::server::AppState;
use crate::db::Subscription;
use crate::notify::{AlertSummary, Channel, NotifyError};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Request body for dispatching a single notification
#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub channel: Channel,
    /// Email address or Telegram chat id, depending on the channel
    pub destination: String,
    pub alert: AlertSummary,
    #[serde(default)]
    pub test: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/notifications/send - dispatch one alert via the external
/// service for the requested channel. Failures map to a non-2xx status but
/// never touch the alert pipeline.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<NotificationResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state
        .notifier
        .send(request.channel, &request.destination, &request.alert, request.test)
        .await
    {
        Ok(()) => Ok(Json(NotificationResponse {
            success: true,
            message: "Notification sent".to_string(),
        })),
        Err(e) => {
            error!("Notification dispatch failed: {}", e);
            let status = match &e {
                NotifyError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                NotifyError::Rejected(_) => StatusCode::BAD_GATEWAY,
                NotifyError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}

/// Request body for creating a subscription
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub email: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Personal whale threshold; defaults to the server-wide one
    pub min_usd: Option<Decimal>,
}

/// POST /api/subscriptions - register a notification subscription
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), (StatusCode, Json<ErrorResponse>)> {
    if request.email.is_none() && request.telegram_chat_id.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("An email or telegram chat id is required")),
        ));
    }

    let min_usd = request.min_usd.unwrap_or(state.config.min_whale_usd);

    match state
        .db
        .add_subscription(request.email.as_deref(), request.telegram_chat_id.as_deref(), min_usd)
        .await
    {
        Ok(subscription) => Ok((StatusCode::CREATED, Json(subscription))),
        Err(e) => {
            error!("Failed to create subscription: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create subscription")),
            ))
        }
    }
}

/// GET /api/subscriptions - list registered subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Subscription>>, (StatusCode, Json<ErrorResponse>)> {
    match state.db.list_subscriptions().await {
        Ok(subs) => Ok(Json(subs)),
        Err(e) => {
            error!("Failed to list subscriptions: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to list subscriptions")),
            ))
        }
    }
}
