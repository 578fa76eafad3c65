//! HTTP API surface.

pub mod auth;
pub mod chat;
pub mod integrations;
pub mod oauth;
pub mod sessions;
pub mod settings;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Assemble the full router: a public liveness probe plus the protected
/// API behind the identity middleware.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/chat", post(chat::chat))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:session_id", get(sessions::session_detail))
        .route("/v1/integrations", get(integrations::list_integrations))
        .route(
            "/v1/integrations/fireflies",
            put(integrations::connect_fireflies),
        )
        .route(
            "/v1/integrations/:provider",
            delete(integrations::disconnect),
        )
        .route("/v1/settings", get(settings::get_settings).put(settings::put_settings))
        .route("/v1/oauth/:provider", get(oauth::connect))
        .route("/v1/oauth/:provider/callback", get(oauth::callback))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_identity,
        ));

    Router::new()
        .route("/v1/health", get(health))
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// API error mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors that reach API callers. Integration and persistence failures are
/// absorbed before this layer; only auth, validation, not-found, and
/// completion-service failures surface.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Validation(String),
    NotFound(String),
    /// The completion client could not be constructed (missing API key).
    CompletionUnavailable,
    /// A completion request failed mid-turn.
    CompletionFailed(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }
}

impl From<adjutant_domain::Error> for ApiError {
    fn from(err: adjutant_domain::Error) -> Self {
        use adjutant_domain::Error;
        match err {
            Error::Auth(msg) => ApiError::Unauthorized(msg),
            Error::Validation(msg) => ApiError::Validation(msg),
            Error::Completion(msg) | Error::Timeout(msg) => ApiError::CompletionFailed(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".to_owned()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::CompletionUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI service not configured".to_owned(),
            ),
            ApiError::CompletionFailed(msg) => {
                tracing::error!(error = %msg, "completion service failure");
                (StatusCode::BAD_GATEWAY, "AI service request failed".to_owned())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process request".to_owned(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
