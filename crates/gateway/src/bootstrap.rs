//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use adjutant_credentials::{
    CredentialStore, HttpTokenExchanger, OAuthApp, TokenCipher, TokenRefresher,
};
use adjutant_domain::config::Config;
use adjutant_integrations::{CapabilityResolver, ToolBroker};
use adjutant_providers::{AnthropicProvider, CompletionProvider};
use adjutant_sessions::{SessionStore, SettingsStore, TranscriptWriter};

use crate::api::auth;
use crate::state::AppState;

/// Initialize every subsystem and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── At-rest cipher (required) ────────────────────────────────────
    let cipher = TokenCipher::from_env(&config.credentials.encryption_key_env)
        .context("initializing credential cipher")?;

    // ── Credential store + refresher ─────────────────────────────────
    let credentials = Arc::new(
        CredentialStore::open(&config.state.path, cipher)
            .context("initializing credential store")?,
    );

    let oauth_google = load_oauth_app(&config.oauth.google, "google");
    let oauth_asana = load_oauth_app(&config.oauth.asana, "asana");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let exchanger = HttpTokenExchanger::new(
        http.clone(),
        oauth_google.as_deref().cloned(),
        oauth_asana.as_deref().cloned(),
    );
    let tokens = Arc::new(TokenRefresher::new(credentials.clone(), Arc::new(exchanger)));

    // ── Tools ────────────────────────────────────────────────────────
    let capabilities = Arc::new(CapabilityResolver::new(credentials.clone()));
    let broker =
        Arc::new(ToolBroker::new(tokens.clone()).context("initializing tool broker")?);

    // ── Sessions ─────────────────────────────────────────────────────
    let sessions = Arc::new(
        SessionStore::open(&config.state.path).context("initializing session store")?,
    );
    let transcripts = Arc::new(
        TranscriptWriter::new(&config.state.path).context("initializing transcripts")?,
    );
    let settings = Arc::new(
        SettingsStore::open(&config.state.path).context("initializing settings store")?,
    );

    // ── Completion client ────────────────────────────────────────────
    // A missing API key does not stop the server: the chat endpoint
    // reports "AI service not configured" until the operator fixes it.
    let (completion, completion_init_error): (Option<Arc<dyn CompletionProvider>>, _) =
        match AnthropicProvider::from_config(&config.completion) {
            Ok(provider) => {
                tracing::info!(model = %config.completion.model, "completion client ready");
                (Some(Arc::new(provider)), None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "completion client unavailable");
                (None, Some(e.to_string()))
            }
        };

    let api_token_hash = auth::token_hash_from_env(&config.server.api_token_env);

    Ok(AppState {
        config,
        completion,
        completion_init_error,
        credentials,
        tokens,
        oauth_google,
        oauth_asana,
        capabilities,
        broker,
        sessions,
        transcripts,
        settings,
        http,
        api_token_hash,
    })
}

fn load_oauth_app(
    cfg: &adjutant_domain::config::OauthClientConfig,
    name: &str,
) -> Option<Arc<OAuthApp>> {
    match OAuthApp::from_env(cfg) {
        Ok(app) => Some(Arc::new(app)),
        Err(e) => {
            tracing::warn!(provider = name, error = %e, "OAuth client not configured — connect flow disabled");
            None
        }
    }
}
