//! OAuth connect/callback endpoints for the integration providers.
//!
//! Standard authorization-code redirect flow. The state parameter embeds
//! the authenticated user id (plus a nonce) and is verified in the callback
//! so one user's grant can never be bound to another user's account. On any
//! failure the user lands back on the settings surface with an error
//! indicator — no partial credential is ever stored.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use serde::Deserialize;

use adjutant_credentials::{oauth, NewCredential, OAuthApp};
use adjutant_domain::capability::Provider;

use crate::api::auth::AuthedUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /v1/oauth/{provider}` — start a connect attempt: 302 to the
/// provider's authorization page.
pub async fn connect(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(provider): Path<String>,
) -> Response {
    let Some(provider) = Provider::parse(&provider).filter(Provider::is_oauth) else {
        return settings_redirect(&state, "error=unknown_provider");
    };
    let Some(app) = oauth_app(&state, provider) else {
        tracing::error!(provider = %provider, "OAuth client credentials not configured");
        return settings_redirect(&state, "error=oauth_not_configured");
    };

    let state_param = oauth::encode_state(&user_id);
    let redirect = oauth::redirect_uri(&state.config.server.app_base_url, provider);
    match oauth::authorize_url(provider, &app, &redirect, &state_param) {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "failed to build authorize URL");
            settings_redirect(&state, "error=oauth_not_configured")
        }
    }
}

/// `GET /v1/oauth/{provider}/callback` — finish a connect attempt: verify
/// state, exchange the code, fetch the connected account, upsert the
/// credential.
pub async fn callback(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(provider) = Provider::parse(&provider).filter(Provider::is_oauth) else {
        return settings_redirect(&state, "error=unknown_provider");
    };

    // The provider reported a denial or failure.
    if let Some(err) = &params.error {
        tracing::warn!(provider = %provider, error = %err, "OAuth provider returned error");
        return settings_redirect(&state, &format!("error={err}"));
    }

    let (Some(code), Some(state_param)) = (&params.code, &params.state) else {
        return settings_redirect(&state, "error=missing_params");
    };

    // CSRF check: the state must have been minted for this very user.
    if let Err(e) = oauth::verify_state(state_param, &user_id) {
        tracing::warn!(provider = %provider, error = %e, "OAuth state verification failed");
        return settings_redirect(&state, "error=invalid_state");
    }

    let Some(app) = oauth_app(&state, provider) else {
        return settings_redirect(&state, "error=oauth_not_configured");
    };

    let redirect = oauth::redirect_uri(&state.config.server.app_base_url, provider);
    let tokens = match oauth::exchange_code(&state.http, provider, &app, code, &redirect).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "code exchange failed");
            return settings_redirect(&state, "error=token_exchange_failed");
        }
    };

    // Best-effort: which account did the user connect?
    let connected_account =
        oauth::fetch_connected_account(&state.http, provider, &tokens.access_token).await;

    let expires_at = tokens
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs.min(86_400 * 365) as i64));
    let scopes = oauth::endpoints(provider)
        .map(|eps| eps.scopes.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();

    let new_credential = NewCredential {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at,
        scopes,
        connected_account,
    };
    if let Err(e) = state.credentials.upsert(&user_id, provider, new_credential) {
        tracing::error!(provider = %provider, error = %e, "failed to store credential");
        return settings_redirect(&state, "error=storage_error");
    }

    tracing::info!(provider = %provider, "integration connected");
    settings_redirect(&state, &format!("success={provider}_connected"))
}

fn oauth_app(state: &AppState, provider: Provider) -> Option<Arc<OAuthApp>> {
    match provider {
        Provider::Google => state.oauth_google.clone(),
        Provider::Asana => state.oauth_asana.clone(),
        Provider::Fireflies => None,
    }
}

fn settings_redirect(state: &AppState, query: &str) -> Response {
    let base = state.config.server.app_base_url.trim_end_matches('/');
    Redirect::temporary(&format!("{base}/settings?{query}")).into_response()
}
