//! Shared helpers for provider adapters.

use adjutant_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] from a completion call into the domain
/// [`Error`] type. Everything here is a completion-service failure; the
/// timeout case keeps its own variant so operators can tell the two apart
/// in logs.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("completion request timed out: {e}"))
    } else {
        Error::Completion(e.to_string())
    }
}

/// Resolve the service API key from the configured environment variable.
pub(crate) fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Completion(format!(
            "environment variable '{env_var}' is not set — the completion \
             service cannot be reached without it"
        ))),
    }
}
