use std::sync::Arc;

use adjutant_credentials::{CredentialStore, OAuthApp, TokenRefresher};
use adjutant_domain::config::Config;
use adjutant_integrations::{CapabilityResolver, ToolBroker};
use adjutant_providers::CompletionProvider;
use adjutant_sessions::{SessionStore, SettingsStore, TranscriptWriter};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, the completion client
/// - **Credentials** — encrypted store, refresher, OAuth app registrations
/// - **Tools** — capability resolver and dispatcher
/// - **Sessions** — session metadata, transcripts, user settings
/// - **Security** — startup-computed gateway token hash
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    /// The completion client. `None` when construction failed at startup
    /// (typically a missing API key); the chat endpoint reports that as
    /// "AI service not configured" instead of a generic failure.
    pub completion: Option<Arc<dyn CompletionProvider>>,
    /// Why the completion client is unavailable, when it is.
    pub completion_init_error: Option<String>,

    // ── Credentials ───────────────────────────────────────────────────
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenRefresher>,
    /// OAuth app registrations; `None` when the env vars aren't set.
    pub oauth_google: Option<Arc<OAuthApp>>,
    pub oauth_asana: Option<Arc<OAuthApp>>,

    // ── Tools ─────────────────────────────────────────────────────────
    pub capabilities: Arc<CapabilityResolver>,
    pub broker: Arc<ToolBroker>,

    // ── Sessions ──────────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub transcripts: Arc<TranscriptWriter>,
    pub settings: Arc<SettingsStore>,

    // ── Misc ──────────────────────────────────────────────────────────
    /// Shared HTTP client for OAuth exchanges and API-key verification.
    pub http: reqwest::Client,
    /// SHA-256 hash of the gateway bearer token (read once at startup).
    /// `None` = dev mode (no token enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
