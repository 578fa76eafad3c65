//! Token refresh — produce a currently-valid access token for a
//! (user, provider) pair, transparently refreshing when needed.
//!
//! Evaluated fresh on every lookup; there is no background refresh. A
//! per-(user, provider) lock serializes the read-refresh-write window so two
//! near-simultaneous expiring lookups perform one provider exchange between
//! them — the loser of the race re-reads the freshly persisted credential.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use adjutant_domain::capability::Provider;
use adjutant_domain::error::{Error, Result};

use crate::oauth::{self, OAuthApp, TokenResponse};
use crate::store::{Credential, CredentialStore};

/// Proactive refresh window: refresh when less than 5 minutes remain.
const REFRESH_WINDOW_SECS: i64 = 300;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exchange seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The refresh-token grant against a provider's token endpoint.
#[async_trait::async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn refresh(&self, provider: Provider, refresh_token: &str) -> Result<TokenResponse>;
}

/// HTTP implementation of the refresh grant. An unconfigured provider (env
/// vars absent at startup) fails the exchange with a config error, which
/// the refresher absorbs into "no valid token".
pub struct HttpTokenExchanger {
    client: reqwest::Client,
    google: Option<OAuthApp>,
    asana: Option<OAuthApp>,
}

impl HttpTokenExchanger {
    pub fn new(
        client: reqwest::Client,
        google: Option<OAuthApp>,
        asana: Option<OAuthApp>,
    ) -> Self {
        Self { client, google, asana }
    }

    fn app_for(&self, provider: Provider) -> Result<&OAuthApp> {
        let app = match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Asana => self.asana.as_ref(),
            Provider::Fireflies => {
                return Err(Error::Config(
                    "fireflies credentials are API keys and cannot be refreshed".into(),
                ))
            }
        };
        app.ok_or_else(|| {
            Error::Config(format!("OAuth client for {provider} is not configured"))
        })
    }
}

#[async_trait::async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn refresh(&self, provider: Provider, refresh_token: &str) -> Result<TokenResponse> {
        let app = self.app_for(provider)?;
        let eps = oauth::endpoints(provider)
            .ok_or_else(|| Error::Config(format!("{provider} has no token endpoint")))?;

        let resp = self
            .client
            .post(eps.token_endpoint)
            .form(&[
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token refresh request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Auth(format!("reading refresh response: {e}")))?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token refresh returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("parsing refresh response: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-credential refresh locks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One `Semaphore(1)` per (user, provider) pair. Holding the permit covers
/// the re-read + exchange + persist window.
struct RefreshLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl RefreshLockMap {
    fn new() -> Self {
        Self { locks: Mutex::new(HashMap::new()) }
    }

    async fn acquire(&self, user_id: &str, provider: Provider) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(format!("{user_id}/{provider}"))
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other("refresh lock closed".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Refresher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TokenRefresher {
    store: Arc<CredentialStore>,
    exchanger: Arc<dyn TokenExchanger>,
    locks: RefreshLockMap,
}

impl TokenRefresher {
    pub fn new(store: Arc<CredentialStore>, exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self { store, exchanger, locks: RefreshLockMap::new() }
    }

    /// Produce a currently-valid access token for (user, provider), or
    /// `None` when no usable token exists. Never raises: a failed refresh
    /// means re-authentication happens out of band via the connect flow.
    ///
    /// State machine per lookup:
    /// - more than 5 minutes of validity left → stored token, no network;
    /// - expiring/expired with a refresh token → exactly one refresh
    ///   exchange, persist, return the new token;
    /// - expiring/expired without a refresh token, no credential, or a
    ///   failed exchange → `None`.
    pub async fn valid_access_token(&self, user_id: &str, provider: Provider) -> Option<String> {
        let cred = self.load(user_id, provider)?;

        if !needs_refresh(&cred, Utc::now()) {
            return Some(cred.access_token);
        }

        let _permit = match self.locks.acquire(user_id, provider).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(user_id, provider = %provider, error = %e, "refresh lock unavailable");
                return None;
            }
        };

        // Re-read under the lock: a concurrent lookup may have refreshed
        // while we waited for the permit.
        let cred = self.load(user_id, provider)?;
        if !needs_refresh(&cred, Utc::now()) {
            return Some(cred.access_token);
        }

        let Some(refresh_token) = cred.refresh_token.as_deref() else {
            tracing::info!(
                user_id,
                provider = %provider,
                "access token expired and no refresh token is stored — reconnect required"
            );
            return None;
        };

        tracing::info!(user_id, provider = %provider, "access token near expiry, refreshing");

        match self.exchanger.refresh(provider, refresh_token).await {
            Ok(tokens) => {
                let expires_at = expiry_from_now(tokens.expires_in);
                if let Err(e) = self.store.update_tokens(
                    user_id,
                    provider,
                    &tokens.access_token,
                    tokens.refresh_token.as_deref(),
                    expires_at,
                ) {
                    tracing::warn!(
                        user_id,
                        provider = %provider,
                        error = %e,
                        "failed to persist refreshed token — using in-memory token"
                    );
                }
                Some(tokens.access_token)
            }
            Err(e) => {
                tracing::warn!(user_id, provider = %provider, error = %e, "token refresh failed");
                None
            }
        }
    }

    /// Whether the user currently holds a usable token for the provider.
    pub async fn has_valid_connection(&self, user_id: &str, provider: Provider) -> bool {
        self.valid_access_token(user_id, provider).await.is_some()
    }

    fn load(&self, user_id: &str, provider: Provider) -> Option<Credential> {
        match self.store.get(user_id, provider) {
            Ok(Some(cred)) => Some(cred),
            Ok(None) => {
                tracing::debug!(user_id, provider = %provider, "no credential stored");
                None
            }
            Err(e) => {
                tracing::warn!(user_id, provider = %provider, error = %e, "credential read failed");
                None
            }
        }
    }
}

fn needs_refresh(cred: &Credential, now: DateTime<Utc>) -> bool {
    match cred.expires_at {
        // API keys and non-expiring grants never refresh.
        None => false,
        Some(expires_at) => (expires_at - now).num_seconds() <= REFRESH_WINDOW_SECS,
    }
}

fn expiry_from_now(expires_in: Option<u64>) -> Option<DateTime<Utc>> {
    // Cap to a year so a bogus provider value cannot overflow the timestamp.
    expires_in.map(|secs| Utc::now() + Duration::seconds(secs.min(86_400 * 365) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TokenCipher;
    use crate::store::NewCredential;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedExchanger {
        calls: AtomicUsize,
        response: Result<TokenResponse>,
    }

    impl ScriptedExchanger {
        fn ok(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(TokenResponse {
                    access_token: access.into(),
                    refresh_token: refresh.map(str::to_owned),
                    expires_in,
                }),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(Error::Auth("invalid_grant".into())),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TokenExchanger for ScriptedExchanger {
        async fn refresh(&self, _provider: Provider, _rt: &str) -> Result<TokenResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(Error::Auth(e.to_string())),
            }
        }
    }

    fn store_in(dir: &std::path::Path) -> Arc<CredentialStore> {
        Arc::new(
            CredentialStore::open(dir, TokenCipher::from_secret("refresh-test").unwrap())
                .unwrap(),
        )
    }

    fn seed(
        store: &CredentialStore,
        provider: Provider,
        refresh_token: Option<&str>,
        expires_in_secs: Option<i64>,
    ) {
        store
            .upsert(
                "user-1",
                provider,
                NewCredential {
                    access_token: "stored-access".into(),
                    refresh_token: refresh_token.map(str::to_owned),
                    expires_at: expires_in_secs.map(|s| Utc::now() + Duration::seconds(s)),
                    scopes: Vec::new(),
                    connected_account: None,
                },
            )
            .unwrap();
    }

    #[tokio::test]
    async fn valid_token_skips_the_network() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        // Expires in an hour — comfortably outside the 5-minute window.
        seed(&store, Provider::Google, Some("rt"), Some(3600));

        let exchanger = Arc::new(ScriptedExchanger::ok("fresh", None, Some(3600)));
        let refresher = TokenRefresher::new(store, exchanger.clone());

        let token = refresher.valid_access_token("user-1", Provider::Google).await;
        assert_eq!(token.as_deref(), Some("stored-access"));
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn expired_token_refreshes_exactly_once_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        // Expired one minute ago.
        seed(&store, Provider::Google, Some("rt"), Some(-60));

        let exchanger = Arc::new(ScriptedExchanger::ok("fresh-access", None, Some(3600)));
        let refresher = TokenRefresher::new(store.clone(), exchanger.clone());

        let token = refresher.valid_access_token("user-1", Provider::Google).await;
        assert_eq!(token.as_deref(), Some("fresh-access"));
        assert_eq!(exchanger.call_count(), 1);

        // The new token and expiry are persisted; the caller never observed
        // the intermediate invalid state.
        let cred = store.get("user-1", Provider::Google).unwrap().unwrap();
        assert_eq!(cred.access_token, "fresh-access");
        let remaining = (cred.expires_at.unwrap() - Utc::now()).num_seconds();
        assert!(remaining > REFRESH_WINDOW_SECS);
        // Non-rotating provider: the old refresh token survives.
        assert_eq!(cred.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn token_inside_safety_margin_refreshes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        // Expires in 2 minutes — inside the 5-minute window.
        seed(&store, Provider::Google, Some("rt"), Some(120));

        let exchanger = Arc::new(ScriptedExchanger::ok("fresh", Some("rt2"), Some(3600)));
        let refresher = TokenRefresher::new(store.clone(), exchanger.clone());

        assert_eq!(
            refresher.valid_access_token("user-1", Provider::Google).await.as_deref(),
            Some("fresh")
        );
        assert_eq!(exchanger.call_count(), 1);
        // Rotating provider: the new refresh token replaced the old one.
        let cred = store.get("user-1", Provider::Google).unwrap().unwrap();
        assert_eq!(cred.refresh_token.as_deref(), Some("rt2"));
    }

    #[tokio::test]
    async fn expired_without_refresh_token_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        seed(&store, Provider::Asana, None, Some(-60));

        let exchanger = Arc::new(ScriptedExchanger::ok("unused", None, None));
        let refresher = TokenRefresher::new(store, exchanger.clone());

        assert!(refresher.valid_access_token("user-1", Provider::Asana).await.is_none());
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_returns_none_without_raising() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        seed(&store, Provider::Google, Some("revoked-rt"), Some(-60));

        let exchanger = Arc::new(ScriptedExchanger::failing());
        let refresher = TokenRefresher::new(store.clone(), exchanger.clone());

        assert!(refresher.valid_access_token("user-1", Provider::Google).await.is_none());
        assert_eq!(exchanger.call_count(), 1);
        // The stale credential is left in place for out-of-band reconnect.
        assert!(store.get("user-1", Provider::Google).unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_credential_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let refresher = TokenRefresher::new(
            store_in(tmp.path()),
            Arc::new(ScriptedExchanger::ok("x", None, None)),
        );
        assert!(refresher.valid_access_token("nobody", Provider::Google).await.is_none());
    }

    #[tokio::test]
    async fn api_key_credentials_never_refresh() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        // Fireflies key: no expiry, no refresh token.
        seed(&store, Provider::Fireflies, None, None);

        let exchanger = Arc::new(ScriptedExchanger::failing());
        let refresher = TokenRefresher::new(store, exchanger.clone());

        assert_eq!(
            refresher.valid_access_token("user-1", Provider::Fireflies).await.as_deref(),
            Some("stored-access")
        );
        assert_eq!(exchanger.call_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_expiring_lookups_refresh_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        seed(&store, Provider::Google, Some("rt"), Some(-60));

        let exchanger = Arc::new(ScriptedExchanger::ok("fresh", None, Some(3600)));
        let refresher = Arc::new(TokenRefresher::new(store, exchanger.clone()));

        let a = {
            let r = refresher.clone();
            tokio::spawn(async move { r.valid_access_token("user-1", Provider::Google).await })
        };
        let b = {
            let r = refresher.clone();
            tokio::spawn(async move { r.valid_access_token("user-1", Provider::Google).await })
        };

        assert_eq!(a.await.unwrap().as_deref(), Some("fresh"));
        assert_eq!(b.await.unwrap().as_deref(), Some("fresh"));
        // The loser of the lock race re-read the refreshed credential
        // instead of issuing a second exchange.
        assert_eq!(exchanger.call_count(), 1);
    }
}
