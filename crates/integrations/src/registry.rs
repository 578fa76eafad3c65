//! Tool catalog and dispatch.
//!
//! Tool identity is a closed enum over {provider, operation}: parsing a
//! model-supplied name is the only place "unknown tool" can arise, and the
//! routing match below is total by construction.

use std::sync::Arc;

use serde_json::Value;

use adjutant_credentials::TokenRefresher;
use adjutant_domain::capability::CapabilitySnapshot;
use adjutant_domain::error::Result;
use adjutant_domain::tool::{ToolDefinition, ToolOutcome};

use crate::asana::{self, AsanaOp};
use crate::calendar::{self, CalendarOp};
use crate::fireflies::{self, FirefliesOp};
use crate::gmail::{self, GmailOp};
use crate::{truncate_str, Ctx};

/// Upper bound on the rendered size of a single tool result fed back into
/// the model, to keep context growth in check.
pub const RESULT_RENDER_CAP: usize = 20_000;

/// Timeout for individual provider API calls. A timeout is a normal
/// tool-level failure, not a crash.
const PROVIDER_TIMEOUT_SECS: u64 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolId
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every tool the registry can route, as {provider, operation}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    Gmail(GmailOp),
    Calendar(CalendarOp),
    Asana(AsanaOp),
    Fireflies(FirefliesOp),
}

impl ToolId {
    pub const ALL: [ToolId; 14] = [
        ToolId::Gmail(GmailOp::SearchEmails),
        ToolId::Gmail(GmailOp::GetEmail),
        ToolId::Gmail(GmailOp::SendEmail),
        ToolId::Calendar(CalendarOp::ListEvents),
        ToolId::Calendar(CalendarOp::GetEvent),
        ToolId::Calendar(CalendarOp::CreateEvent),
        ToolId::Calendar(CalendarOp::UpdateEvent),
        ToolId::Asana(AsanaOp::ListTasks),
        ToolId::Asana(AsanaOp::GetTask),
        ToolId::Asana(AsanaOp::CreateTask),
        ToolId::Asana(AsanaOp::CompleteTask),
        ToolId::Fireflies(FirefliesOp::ListTranscripts),
        ToolId::Fireflies(FirefliesOp::GetTranscript),
        ToolId::Fireflies(FirefliesOp::SearchTranscripts),
    ];

    /// The wire name exposed to the model.
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::Gmail(GmailOp::SearchEmails) => "search_emails",
            ToolId::Gmail(GmailOp::GetEmail) => "get_email",
            ToolId::Gmail(GmailOp::SendEmail) => "send_email",
            ToolId::Calendar(CalendarOp::ListEvents) => "list_calendar_events",
            ToolId::Calendar(CalendarOp::GetEvent) => "get_calendar_event",
            ToolId::Calendar(CalendarOp::CreateEvent) => "create_calendar_event",
            ToolId::Calendar(CalendarOp::UpdateEvent) => "update_calendar_event",
            ToolId::Asana(AsanaOp::ListTasks) => "list_asana_tasks",
            ToolId::Asana(AsanaOp::GetTask) => "get_asana_task",
            ToolId::Asana(AsanaOp::CreateTask) => "create_asana_task",
            ToolId::Asana(AsanaOp::CompleteTask) => "complete_asana_task",
            ToolId::Fireflies(FirefliesOp::ListTranscripts) => "list_fireflies_transcripts",
            ToolId::Fireflies(FirefliesOp::GetTranscript) => "get_fireflies_transcript",
            ToolId::Fireflies(FirefliesOp::SearchTranscripts) => "search_fireflies_transcripts",
        }
    }

    /// Parse a model-supplied tool name. `None` is the sole source of the
    /// "unknown tool" outcome.
    pub fn parse(name: &str) -> Option<ToolId> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Visible tool set
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The subset of tool definitions a user may currently invoke, filtered by
/// their capability snapshot. Never returns a tool for a provider the user
/// hasn't connected; Google tools are additionally gated on scope.
pub fn visible_tools(snapshot: &CapabilitySnapshot) -> Vec<ToolDefinition> {
    let mut defs = Vec::new();
    if snapshot.has_gmail_scope() {
        defs.extend(gmail::tool_definitions());
    }
    if snapshot.has_calendar_scope() {
        defs.extend(calendar::tool_definitions());
    }
    if snapshot.asana {
        defs.extend(asana::tool_definitions());
    }
    if snapshot.fireflies {
        defs.extend(fireflies::tool_definitions());
    }
    defs
}

/// Render a dispatch outcome as the textual payload handed to the model,
/// clamped to [`RESULT_RENDER_CAP`].
pub fn render_for_model(outcome: &ToolOutcome) -> String {
    let rendered = outcome.render();
    if rendered.chars().count() > RESULT_RENDER_CAP {
        let mut clipped = truncate_str(&rendered, RESULT_RENDER_CAP);
        clipped.push_str("\n[result truncated]");
        clipped
    } else {
        rendered
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The seam the orchestrator dispatches through. Implementations must never
/// panic and never return an error across this boundary.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn dispatch(&self, user_id: &str, tool_name: &str, input: &Value) -> ToolOutcome;
}

/// The production dispatcher: routes a parsed [`ToolId`] to its adapter,
/// sharing one HTTP client and the token refresher across all of them.
pub struct ToolBroker {
    http: reqwest::Client,
    tokens: Arc<TokenRefresher>,
}

impl ToolBroker {
    pub fn new(tokens: Arc<TokenRefresher>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| adjutant_domain::Error::Http(e.to_string()))?;
        Ok(Self { http, tokens })
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ToolBroker {
    async fn dispatch(&self, user_id: &str, tool_name: &str, input: &Value) -> ToolOutcome {
        let Some(tool) = ToolId::parse(tool_name) else {
            return ToolOutcome::err(format!("Unknown tool: {tool_name}"));
        };

        let ctx = Ctx { http: &self.http, tokens: &self.tokens, user_id };

        match tool {
            ToolId::Gmail(op) => gmail::handle(&ctx, op, input).await,
            ToolId::Calendar(op) => calendar::handle(&ctx, op, input).await,
            ToolId::Asana(op) => asana::handle(&ctx, op, input).await,
            ToolId::Fireflies(op) => fireflies::handle(&ctx, op, input).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_name_roundtrips() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::parse(id.name()), Some(id), "{}", id.name());
        }
    }

    #[test]
    fn tool_names_are_unique() {
        let mut names: Vec<_> = ToolId::ALL.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ToolId::ALL.len());
    }

    #[test]
    fn unknown_name_does_not_parse() {
        assert_eq!(ToolId::parse("delete_everything"), None);
        assert_eq!(ToolId::parse(""), None);
    }

    #[test]
    fn every_catalog_tool_has_a_definition() {
        // The full snapshot must expose exactly one definition per ToolId.
        let all = CapabilitySnapshot {
            google: true,
            asana: true,
            fireflies: true,
            google_scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".into(),
                "https://www.googleapis.com/auth/calendar".into(),
            ],
        };
        let defs = visible_tools(&all);
        assert_eq!(defs.len(), ToolId::ALL.len());
        for def in &defs {
            assert!(ToolId::parse(&def.name).is_some(), "{} unroutable", def.name);
        }
    }

    #[test]
    fn empty_snapshot_exposes_nothing() {
        let defs = visible_tools(&CapabilitySnapshot::default());
        assert!(defs.is_empty());
    }

    #[test]
    fn calendar_tools_require_calendar_scope() {
        let gmail_only = CapabilitySnapshot {
            google: true,
            google_scopes: vec!["https://www.googleapis.com/auth/gmail.send".into()],
            ..Default::default()
        };
        let defs = visible_tools(&gmail_only);
        assert!(defs.iter().any(|d| d.name == "send_email"));
        assert!(!defs.iter().any(|d| d.name.contains("calendar")));
    }

    #[test]
    fn asana_connection_exposes_only_asana_tools() {
        let asana_only = CapabilitySnapshot { asana: true, ..Default::default() };
        let defs = visible_tools(&asana_only);
        assert_eq!(defs.len(), 4);
        assert!(defs.iter().all(|d| d.name.contains("asana")));
    }

    #[tokio::test]
    async fn broker_dispatch_never_raises() {
        use adjutant_credentials::{CredentialStore, HttpTokenExchanger, TokenCipher, TokenRefresher};

        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(
            CredentialStore::open(tmp.path(), TokenCipher::from_secret("broker-test").unwrap())
                .unwrap(),
        );
        let exchanger = Arc::new(HttpTokenExchanger::new(reqwest::Client::new(), None, None));
        let tokens = Arc::new(TokenRefresher::new(store, exchanger));
        let broker = ToolBroker::new(tokens).unwrap();

        // Unknown tool name is a handled error, not a panic.
        let outcome = broker
            .dispatch("user-1", "delete_everything", &serde_json::json!({}))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Unknown tool"));

        // A known tool with no stored credential resolves offline to a
        // reconnect hint.
        let outcome = broker
            .dispatch("user-1", "list_asana_tasks", &serde_json::json!({}))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not connected"));
    }

    #[test]
    fn oversized_results_are_clamped() {
        let big = "x".repeat(RESULT_RENDER_CAP + 500);
        let outcome = ToolOutcome::ok(serde_json::Value::String(big));
        let rendered = render_for_model(&outcome);
        assert!(rendered.chars().count() <= RESULT_RENDER_CAP + 20);
        assert!(rendered.ends_with("[result truncated]"));
    }
}
