//! OAuth 2.0 authorization-code plumbing for the integration providers.
//!
//! Endpoint/scope constants per provider, authorize-URL building, the code
//! exchange, and the state-parameter codec that binds a connect attempt to
//! the authenticated user (CSRF check).

use base64::Engine;
use serde::{Deserialize, Serialize};

use adjutant_domain::capability::Provider;
use adjutant_domain::config::OauthClientConfig;
use adjutant_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OAuthEndpoints {
    pub authorization_endpoint: &'static str,
    pub token_endpoint: &'static str,
    pub user_info_endpoint: &'static str,
    pub scopes: &'static [&'static str],
}

pub const GOOGLE_ENDPOINTS: OAuthEndpoints = OAuthEndpoints {
    authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth",
    token_endpoint: "https://oauth2.googleapis.com/token",
    user_info_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo",
    scopes: &[
        "https://www.googleapis.com/auth/gmail.readonly",
        "https://www.googleapis.com/auth/gmail.send",
        "https://www.googleapis.com/auth/calendar",
        "https://www.googleapis.com/auth/calendar.events",
        "https://www.googleapis.com/auth/userinfo.email",
    ],
};

pub const ASANA_ENDPOINTS: OAuthEndpoints = OAuthEndpoints {
    authorization_endpoint: "https://app.asana.com/-/oauth_authorize",
    token_endpoint: "https://app.asana.com/-/oauth_token",
    user_info_endpoint: "https://app.asana.com/api/1.0/users/me",
    scopes: &["default"],
};

/// Endpoint set for an OAuth provider. `None` for API-key providers.
pub fn endpoints(provider: Provider) -> Option<&'static OAuthEndpoints> {
    match provider {
        Provider::Google => Some(&GOOGLE_ENDPOINTS),
        Provider::Asana => Some(&ASANA_ENDPOINTS),
        Provider::Fireflies => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registered application credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The client id/secret this deployment is registered with at a provider.
///
/// `Debug` is manually implemented to redact the secret.
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthApp {
    pub fn from_env(cfg: &OauthClientConfig) -> Result<Self> {
        let client_id = std::env::var(&cfg.client_id_env)
            .map_err(|_| Error::Config(format!("'{}' is not set", cfg.client_id_env)))?;
        let client_secret = std::env::var(&cfg.client_secret_env)
            .map_err(|_| Error::Config(format!("'{}' is not set", cfg.client_secret_env)))?;
        Ok(Self { client_id, client_secret })
    }
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authorization URL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Redirect URI this deployment registers for a provider.
pub fn redirect_uri(app_base_url: &str, provider: Provider) -> String {
    format!(
        "{}/v1/oauth/{}/callback",
        app_base_url.trim_end_matches('/'),
        provider
    )
}

/// Build the provider's authorization URL for a connect attempt.
pub fn authorize_url(
    provider: Provider,
    app: &OAuthApp,
    redirect_uri: &str,
    state: &str,
) -> Result<String> {
    let eps = endpoints(provider)
        .ok_or_else(|| Error::Config(format!("{provider} is not an OAuth provider")))?;

    let mut url = reqwest::Url::parse(eps.authorization_endpoint)
        .map_err(|e| Error::Config(format!("bad authorization endpoint: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("client_id", &app.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &eps.scopes.join(" "))
            .append_pair("state", state);
        if matches!(provider, Provider::Google) {
            // offline + forced consent so Google issues a refresh token.
            pairs
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent");
        }
    }
    Ok(url.into())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token endpoint exchanges
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Response from the token endpoint (both the initial code exchange and the
/// refresh grant).
///
/// `Debug` is manually implemented to redact secrets.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Exchange an authorization code for token material.
pub async fn exchange_code(
    client: &reqwest::Client,
    provider: Provider,
    app: &OAuthApp,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let eps = endpoints(provider)
        .ok_or_else(|| Error::Config(format!("{provider} is not an OAuth provider")))?;

    let resp = client
        .post(eps.token_endpoint)
        .form(&[
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Auth(format!("code exchange request failed: {e}")))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Auth(format!("reading code exchange response: {e}")))?;

    if !status.is_success() {
        return Err(Error::Auth(format!(
            "code exchange returned HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::Auth(format!("parsing code exchange response: {e}")))
}

/// Fetch the email of the account that granted access, for the settings
/// surface. Best-effort: `None` on any failure.
pub async fn fetch_connected_account(
    client: &reqwest::Client,
    provider: Provider,
    access_token: &str,
) -> Option<String> {
    let eps = endpoints(provider)?;
    let resp = client
        .get(eps.user_info_endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body: serde_json::Value = resp.json().await.ok()?;
    match provider {
        Provider::Google => body.get("email")?.as_str().map(str::to_owned),
        // Asana wraps the user object in a `data` envelope.
        Provider::Asana => body.get("data")?.get("email")?.as_str().map(str::to_owned),
        Provider::Fireflies => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State parameter codec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize, Deserialize)]
struct StatePayload {
    user_id: String,
    nonce: String,
}

/// Encode the state parameter for a connect attempt: base64url JSON of the
/// authenticated user id plus a fresh nonce.
pub fn encode_state(user_id: &str) -> String {
    let payload = StatePayload {
        user_id: user_id.to_owned(),
        nonce: uuid::Uuid::new_v4().simple().to_string(),
    };
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
}

/// Verify a callback's state parameter against the authenticated caller.
/// Rejecting a mismatch prevents binding one user's provider grant to
/// another user's account.
pub fn verify_state(state: &str, expected_user_id: &str) -> Result<()> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(state)
        .map_err(|_| Error::Auth("invalid state parameter".into()))?;
    let payload: StatePayload = serde_json::from_slice(&bytes)
        .map_err(|_| Error::Auth("invalid state parameter".into()))?;
    if payload.user_id != expected_user_id {
        return Err(Error::Auth("state parameter user mismatch".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> OAuthApp {
        OAuthApp { client_id: "client-123".into(), client_secret: "shh".into() }
    }

    #[test]
    fn state_roundtrip_accepts_same_user() {
        let state = encode_state("user-1");
        assert!(verify_state(&state, "user-1").is_ok());
    }

    #[test]
    fn state_rejects_other_user() {
        let state = encode_state("user-1");
        assert!(matches!(verify_state(&state, "user-2"), Err(Error::Auth(_))));
    }

    #[test]
    fn state_rejects_garbage() {
        assert!(verify_state("not-base64!!", "user-1").is_err());
        let junk = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(verify_state(&junk, "user-1").is_err());
    }

    #[test]
    fn state_nonce_differs_per_attempt() {
        assert_ne!(encode_state("user-1"), encode_state("user-1"));
    }

    #[test]
    fn google_authorize_url_requests_offline_access() {
        let url = authorize_url(
            Provider::Google,
            &app(),
            "http://localhost:8460/v1/oauth/google/callback",
            "opaque-state",
        )
        .unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=opaque-state"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("gmail.readonly"));
    }

    #[test]
    fn asana_authorize_url_has_no_google_params() {
        let url = authorize_url(
            Provider::Asana,
            &app(),
            "http://localhost:8460/v1/oauth/asana/callback",
            "s",
        )
        .unwrap();
        assert!(url.starts_with("https://app.asana.com/-/oauth_authorize?"));
        assert!(!url.contains("access_type"));
        assert!(url.contains("scope=default"));
    }

    #[test]
    fn fireflies_has_no_oauth_endpoints() {
        assert!(endpoints(Provider::Fireflies).is_none());
        assert!(authorize_url(Provider::Fireflies, &app(), "r", "s").is_err());
    }

    #[test]
    fn redirect_uri_shape() {
        assert_eq!(
            redirect_uri("http://localhost:8460/", Provider::Google),
            "http://localhost:8460/v1/oauth/google/callback"
        );
    }

    #[test]
    fn token_response_parses_minimal_and_full() {
        let full: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(full.refresh_token.as_deref(), Some("r"));
        assert_eq!(full.expires_in, Some(3600));

        let minimal: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert!(minimal.refresh_token.is_none());
        assert!(minimal.expires_in.is_none());
    }

    #[test]
    fn token_response_debug_redacts_secrets() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token":"very-secret","refresh_token":"also-secret"}"#,
        )
        .unwrap();
        let debug = format!("{resp:?}");
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("also-secret"));
    }
}
