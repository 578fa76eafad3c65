//! Encrypted credential store.
//!
//! One credential per (user, provider) pair, kept in memory behind a
//! `RwLock` and persisted to `credentials.json` under the state path with
//! `0o600` permissions on Unix. Token fields are encrypted before they hit
//! the map and decrypted on the way out — callers never see ciphertext and
//! never supply it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use adjutant_domain::capability::Provider;
use adjutant_domain::error::{Error, Result};

use crate::crypto::TokenCipher;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential views
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A decrypted credential, held only transiently in memory.
///
/// `Debug` is manually implemented to redact token material.
#[derive(Clone)]
pub struct Credential {
    pub user_id: String,
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` for credentials that never expire (API keys).
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub connected_account: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("connected_account", &self.connected_account)
            .finish()
    }
}

/// Plaintext input for creating or replacing a credential.
pub struct NewCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub connected_account: Option<String>,
}

/// Connection metadata exposed to the settings surface — no token material.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub provider: Provider,
    pub scopes: Vec<String>,
    pub connected_account: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// On-disk / in-map form. Token fields hold ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCredential {
    user_id: String,
    provider: Provider,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    connected_account: Option<String>,
    updated_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CredentialStore {
    path: PathBuf,
    cipher: TokenCipher,
    entries: RwLock<HashMap<String, StoredCredential>>,
}

impl CredentialStore {
    /// Load or create the store at `state_path/credentials.json`.
    pub fn open(state_path: &Path, cipher: TokenCipher) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("credentials.json");

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            credentials = entries.len(),
            path = %path.display(),
            "credential store loaded"
        );

        Ok(Self { path, cipher, entries: RwLock::new(entries) })
    }

    fn key(user_id: &str, provider: Provider) -> String {
        format!("{user_id}/{provider}")
    }

    /// Look up and decrypt the credential for a (user, provider) pair.
    pub fn get(&self, user_id: &str, provider: Provider) -> Result<Option<Credential>> {
        let stored = {
            let entries = self.entries.read();
            match entries.get(&Self::key(user_id, provider)) {
                Some(s) => s.clone(),
                None => return Ok(None),
            }
        };

        let access_token = self.cipher.decrypt(&stored.access_token)?;
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .map(|ct| self.cipher.decrypt(ct))
            .transpose()?;

        Ok(Some(Credential {
            user_id: stored.user_id,
            provider: stored.provider,
            access_token,
            refresh_token,
            expires_at: stored.expires_at,
            scopes: stored.scopes,
            connected_account: stored.connected_account,
            updated_at: stored.updated_at,
        }))
    }

    /// Create or replace the credential for a (user, provider) pair.
    /// Accepts plaintext tokens and encrypts them before anything is stored.
    pub fn upsert(&self, user_id: &str, provider: Provider, new: NewCredential) -> Result<()> {
        let stored = StoredCredential {
            user_id: user_id.to_owned(),
            provider,
            access_token: self.cipher.encrypt(&new.access_token)?,
            refresh_token: new
                .refresh_token
                .as_deref()
                .map(|t| self.cipher.encrypt(t))
                .transpose()?,
            expires_at: new.expires_at,
            scopes: new.scopes,
            connected_account: new.connected_account,
            updated_at: Utc::now(),
        };

        let mut entries = self.entries.write();
        entries.insert(Self::key(user_id, provider), stored);
        self.persist(&entries)
    }

    /// Apply refreshed token material: always the new access token and
    /// expiry; the refresh token only when the provider rotated it (some
    /// providers never do — the old one stays valid and is kept).
    pub fn update_tokens(
        &self,
        user_id: &str,
        provider: Provider,
        access_token: &str,
        rotated_refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let encrypted_access = self.cipher.encrypt(access_token)?;
        let encrypted_refresh = rotated_refresh_token
            .map(|t| self.cipher.encrypt(t))
            .transpose()?;

        let mut entries = self.entries.write();
        let stored = entries
            .get_mut(&Self::key(user_id, provider))
            .ok_or_else(|| {
                Error::Other(format!("no {provider} credential for user {user_id}"))
            })?;

        stored.access_token = encrypted_access;
        if let Some(rt) = encrypted_refresh {
            stored.refresh_token = Some(rt);
        }
        stored.expires_at = expires_at;
        stored.updated_at = Utc::now();

        self.persist(&entries)
    }

    /// Remove the credential for a (user, provider) pair. Idempotent.
    pub fn delete(&self, user_id: &str, provider: Provider) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.remove(&Self::key(user_id, provider)).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    /// Connection metadata for every provider the user has connected.
    /// Reads no token material and performs no decryption.
    pub fn list_for_user(&self, user_id: &str) -> Vec<ConnectionInfo> {
        let entries = self.entries.read();
        let mut infos: Vec<ConnectionInfo> = entries
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| ConnectionInfo {
                provider: s.provider,
                scopes: s.scopes.clone(),
                connected_account: s.connected_account.clone(),
                updated_at: s.updated_at,
            })
            .collect();
        infos.sort_by_key(|i| i.provider.as_str());
        infos
    }

    /// Write the full store to disk. On Unix the file is created with mode
    /// `0o600` from the start; an exclusive lock prevents concurrent writers
    /// from corrupting the file.
    fn persist(&self, entries: &HashMap<String, StoredCredential>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;

        #[cfg(unix)]
        let file = {
            use std::os::unix::fs::OpenOptionsExt;
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?
        };

        #[cfg(not(unix))]
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        fs2::FileExt::lock_exclusive(&file)
            .map_err(|e| Error::Other(format!("credential store lock failed: {e}")))?;
        {
            use std::io::Write;
            let mut writer = std::io::BufWriter::new(&file);
            writer.write_all(json.as_bytes())?;
            writer.flush()?;
        }
        // Lock released when `file` drops.
        Ok(())
    }
}
