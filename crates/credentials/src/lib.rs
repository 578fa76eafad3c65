//! Credential storage and the OAuth token lifecycle.
//!
//! Owns per-user, per-provider OAuth (and API-key) material. Tokens are
//! AES-256-GCM encrypted at the store boundary and refreshed on demand with
//! a 5-minute safety margin before expiry — there is no background refresh
//! daemon; every lookup evaluates the credential state fresh.

pub mod crypto;
pub mod oauth;
pub mod refresh;
pub mod store;

pub use crypto::TokenCipher;
pub use oauth::{OAuthApp, TokenResponse};
pub use refresh::{HttpTokenExchanger, TokenExchanger, TokenRefresher};
pub use store::{Credential, CredentialStore, NewCredential};
