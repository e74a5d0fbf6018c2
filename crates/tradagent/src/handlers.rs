//! HTTP Handlers

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use trade_advisor::{AdvisorError, DecisionRecord, ErrorCategory, PortfolioState, TickerDecision};

use crate::state::AppState;

/// Upper bound on `limit` for the history route
pub const MAX_HISTORY_LIMIT: usize = 100;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_connected: bool,
    pub model: String,
    pub market: String,
    pub store: String,
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub ticker: String,
    pub portfolio: PortfolioState,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(category: ErrorCategory) -> (StatusCode, &'static str) {
    match category {
        ErrorCategory::BadInput => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT"),
        ErrorCategory::ModelMisbehavior => (StatusCode::BAD_GATEWAY, "MODEL_ERROR"),
        ErrorCategory::Upstream => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        ErrorCategory::Storage => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR"),
        ErrorCategory::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
        ErrorCategory::Config => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
    }
}

fn api_error(err: &AdvisorError) -> ApiError {
    let (status, code) = status_for(err.category());
    let error = match err {
        AdvisorError::Model(inner) => inner.user_message(),
        other => other.to_string(),
    };
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/decide", post(decide_handler))
        .route("/api/decisions/{ticker}", get(history_handler))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.agent.provider();
    let provider_connected = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.name().to_string(),
        provider_connected,
        model: state.agent.model().to_string(),
        market: state.agent.market().name().to_string(),
        store: state.agent.memory().name().to_string(),
    })
}

/// Run one decision session
pub async fn decide_handler(
    State(state): State<AppState>,
    Json(payload): Json<DecideRequest>,
) -> Result<Json<TickerDecision>, ApiError> {
    let _guard = state.run_lock.lock().await;

    let result = state.agent.run(&payload.ticker, &payload.portfolio).await.map_err(|e| {
        tracing::error!(ticker = %payload.ticker, category = ?e.category(), error = %e, "Decision failed");
        api_error(&e)
    })?;

    Ok(Json(result))
}

/// Recent decisions for a ticker, newest first
pub async fn history_handler(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(trade_advisor::svckit::RECENT_DECISIONS)
        .min(MAX_HISTORY_LIMIT);

    let agent = state.agent.clone();
    let records = tokio::task::spawn_blocking(move || agent.history(&ticker, limit))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "History lookup task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "History lookup failed".into(),
                    code: "INTERNAL_ERROR".into(),
                }),
            )
        })?
        .map_err(|e| api_error(&e))?;

    Ok(Json(records))
}
