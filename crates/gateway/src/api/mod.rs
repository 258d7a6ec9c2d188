//! HTTP surface: chat (SSE), recommend, submit, approval, tracking pixel,
//! and health. Rate limits are per source IP per rolling hour, trusting
//! the first forwarded-for hop so they hold behind a reverse proxy.

pub mod approve;
pub mod chat;
pub mod recommend;
pub mod submit;
pub mod track;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;

use crate::state::AppState;

const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Hourly per-IP budgets.
const SUBMIT_PER_HOUR: u32 = 5;
const RECOMMEND_PER_HOUR: u32 = 10;
const CHAT_PER_HOUR: u32 = 30;

/// Build the full router. Each rate-limited endpoint gets its own
/// governor so one hot path cannot starve the others.
pub fn router() -> Router<AppState> {
    macro_rules! hourly_limit {
        ($budget:expr) => {{
            let config = GovernorConfigBuilder::default()
                .key_extractor(SmartIpKeyExtractor)
                .period(RATE_WINDOW / $budget)
                .burst_size($budget)
                .finish()
                .expect("rate-limit window and burst must be non-zero");
            GovernorLayer {
                config: Arc::new(config),
            }
        }};
    }

    let chat = Router::new()
        .route("/api/chat", post(chat::chat))
        .layer(hourly_limit!(CHAT_PER_HOUR));
    let recommend = Router::new()
        .route("/api/recommend", post(recommend::recommend))
        .layer(hourly_limit!(RECOMMEND_PER_HOUR));
    let submit = Router::new()
        .route("/submit", post(submit::submit))
        .layer(hourly_limit!(SUBMIT_PER_HOUR));

    Router::new()
        .merge(chat)
        .merge(recommend)
        .merge(submit)
        .route(
            "/approve/:token",
            get(approve::approve_page).post(approve::approve_submit),
        )
        .route("/follow-up/track/:id", get(track::pixel))
        .route("/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

// ── Shared handler helpers ──────────────────────────────────────────

/// Standardized JSON error body: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "catalog": state.catalog.len(),
        "database": state.db.is_some(),
    }))
}
