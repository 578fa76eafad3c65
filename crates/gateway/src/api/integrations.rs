//! Integration management endpoints for the settings surface: connection
//! status, API-key connect (Fireflies), and disconnect.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use adjutant_credentials::NewCredential;
use adjutant_domain::capability::Provider;
use adjutant_integrations::fireflies;

use crate::api::auth::AuthedUser;
use crate::api::ApiError;
use crate::state::AppState;

/// `GET /v1/integrations` — connection status per provider. No token
/// material leaves the credential store.
pub async fn list_integrations(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> Json<serde_json::Value> {
    let connections = state.credentials.list_for_user(&user_id);
    Json(json!({ "integrations": connections }))
}

#[derive(Debug, Deserialize)]
pub struct ConnectFirefliesRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// `PUT /v1/integrations/fireflies` — store a Fireflies API key after
/// verifying it against the GraphQL API.
pub async fn connect_fireflies(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<ConnectFirefliesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let api_key = body.api_key.trim();
    if api_key.is_empty() {
        return Err(ApiError::validation("API key is required"));
    }

    if !fireflies::verify_api_key(&state.http, api_key).await {
        return Err(ApiError::validation(
            "Fireflies rejected this API key — check it and try again",
        ));
    }

    state
        .credentials
        .upsert(
            &user_id,
            Provider::Fireflies,
            NewCredential {
                access_token: api_key.to_owned(),
                refresh_token: None,
                expires_at: None,
                scopes: Vec::new(),
                connected_account: None,
            },
        )
        .map_err(|e| ApiError::Internal(format!("failed to store API key: {e}")))?;

    tracing::info!("fireflies connected");
    Ok(Json(json!({ "connected": "fireflies" })))
}

/// `DELETE /v1/integrations/{provider}` — disconnect. Idempotent: deleting
/// a provider that was never connected succeeds.
pub async fn disconnect(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(provider) = Provider::parse(&provider) else {
        return Err(ApiError::validation(format!("unknown provider: {provider}")));
    };

    state
        .credentials
        .delete(&user_id, provider)
        .map_err(|e| ApiError::Internal(format!("failed to delete credential: {e}")))?;

    tracing::info!(provider = %provider, "integration disconnected");
    Ok(Json(json!({ "disconnected": provider.as_str() })))
}
