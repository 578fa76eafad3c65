use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub oauth: OauthConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        toml::from_str(raw).map_err(|e| crate::Error::Config(format!("invalid config: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Public base URL of this deployment — used to build OAuth redirect URIs
    /// and the post-callback settings redirect.
    #[serde(default = "d_app_base_url")]
    pub app_base_url: String,
    /// Env var holding the shared gateway bearer token. Unset or empty env
    /// means dev mode (no token check).
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
    /// Header carrying the authenticated user id, set by the upstream
    /// identity provider that terminates authentication.
    #[serde(default = "d_identity_header")]
    pub identity_header: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            app_base_url: d_app_base_url(),
            api_token_env: d_api_token_env(),
            identity_header: d_identity_header(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Root directory for on-disk state (credentials, sessions, transcripts).
    #[serde(default = "d_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { path: d_state_path() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistant defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Name the assistant uses when the user hasn't picked one.
    #[serde(default = "d_assistant_name")]
    pub default_name: String,
    #[serde(default = "d_timezone")]
    pub default_timezone: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_name: d_assistant_name(),
            default_timezone: d_timezone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completion service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "d_completion_base_url")]
    pub base_url: String,
    #[serde(default = "d_completion_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_completion_model")]
    pub model: String,
    #[serde(default = "d_4096")]
    pub max_tokens: u32,
    #[serde(default = "d_120")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: d_completion_base_url(),
            api_key_env: d_completion_key_env(),
            model: d_completion_model(),
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Env var holding the process-wide secret the at-rest token cipher key
    /// is derived from. The server refuses to start without it.
    #[serde(default = "d_encryption_key_env")]
    pub encryption_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self { encryption_key_env: d_encryption_key_env() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OAuth clients
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthConfig {
    #[serde(default = "d_google_client")]
    pub google: OauthClientConfig,
    #[serde(default = "d_asana_client")]
    pub asana: OauthClientConfig,
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self { google: d_google_client(), asana: d_asana_client() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OauthClientConfig {
    pub client_id_env: String,
    pub client_secret_env: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// OTLP/gRPC endpoint for span export. `None` disables the OTel layer.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: 1.0,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    8460
}
fn d_app_base_url() -> String {
    "http://localhost:8460".into()
}
fn d_api_token_env() -> String {
    "ADJUTANT_API_TOKEN".into()
}
fn d_identity_header() -> String {
    "x-user-id".into()
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_assistant_name() -> String {
    "Chief of Staff".into()
}
fn d_timezone() -> String {
    "America/Phoenix".into()
}
fn d_completion_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_completion_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_completion_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn d_encryption_key_env() -> String {
    "ADJUTANT_ENCRYPTION_KEY".into()
}
fn d_google_client() -> OauthClientConfig {
    OauthClientConfig {
        client_id_env: "GOOGLE_CLIENT_ID".into(),
        client_secret_env: "GOOGLE_CLIENT_SECRET".into(),
    }
}
fn d_asana_client() -> OauthClientConfig {
    OauthClientConfig {
        client_id_env: "ASANA_CLIENT_ID".into(),
        client_secret_env: "ASANA_CLIENT_SECRET".into(),
    }
}
fn d_service_name() -> String {
    "adjutant".into()
}
fn d_sample_rate() -> f64 {
    1.0
}
fn d_4096() -> u32 {
    4096
}
fn d_120() -> u64 {
    120
}
