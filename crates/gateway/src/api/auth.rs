//! Identity middleware.
//!
//! Authentication itself is delegated to an upstream identity provider that
//! terminates the user's session and forwards the caller identity in a
//! header (`server.identity_header`, default `x-user-id`). This middleware
//! rejects requests without that identity before any external call, and —
//! when a gateway token is configured — additionally requires a bearer
//! token, compared in constant time against a SHA-256 digest computed once
//! at startup.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`require_identity`] and read back by the [`AuthedUser`] extractor.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

/// Hash the configured gateway token at startup. `None` when the env var is
/// unset or empty (dev mode).
pub fn token_hash_from_env(env_var: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var) {
        Ok(token) if !token.trim().is_empty() => {
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var,
                "gateway token not configured — running without bearer auth (dev mode)"
            );
            None
        }
    }
}

pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Gateway bearer token, when configured.
    if let Some(expected_hash) = &state.api_token_hash {
        let provided = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");

        // Hash to a fixed-length digest, then compare in constant time so
        // the comparison leaks neither content nor length.
        let provided_hash = Sha256::digest(provided.as_bytes());
        if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            return unauthorized("invalid or missing API token");
        }
    }

    // Forwarded identity.
    let user_id = req
        .headers()
        .get(state.config.server.identity_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    let Some(user_id) = user_id else {
        return unauthorized("missing caller identity");
    };

    req.extensions_mut().insert(AuthedUser(user_id));
    next.run(req).await
}

fn unauthorized(message: &str) -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

// ── Extractor ──────────────────────────────────────────────────────

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthedUser>()
            .cloned()
            .ok_or_else(|| unauthorized("missing caller identity"))
    }
}
