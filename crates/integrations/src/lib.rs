//! Integration adapters and the tool registry.
//!
//! Every capability the model can invoke lives here: the closed [`ToolId`]
//! catalog, per-provider adapters (Gmail, Google Calendar, Asana, Fireflies),
//! the capability resolver that decides which tools a user may see, and the
//! dispatcher that routes a model-issued tool call to its handler. Dispatch
//! never fails across the boundary — every provider error becomes an
//! error-flagged [`ToolOutcome`](adjutant_domain::tool::ToolOutcome) the
//! model can react to.

pub mod asana;
pub mod calendar;
pub mod capability;
pub mod fireflies;
pub mod gmail;
pub mod registry;

pub use capability::CapabilityResolver;
pub use registry::{render_for_model, visible_tools, ToolBroker, ToolExecutor, ToolId};

use adjutant_credentials::TokenRefresher;

/// Per-dispatch context handed to adapters: the shared HTTP client, the
/// token refresher backing every provider call, and the acting user.
pub(crate) struct Ctx<'a> {
    pub http: &'a reqwest::Client,
    pub tokens: &'a TokenRefresher,
    pub user_id: &'a str,
}

/// Truncate on a char boundary.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
