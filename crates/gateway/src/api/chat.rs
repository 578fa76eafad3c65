//! Chat endpoint — the primary interface for running assistant turns.
//!
//! `POST /v1/chat` takes one user message (plus prior turns and an optional
//! session id), runs the tool-augmented conversation loop, persists the
//! exchange best-effort, and returns the final answer with token usage and
//! the tool names exercised.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use adjutant_domain::tool::Message;
use adjutant_integrations::{capability, visible_tools};
use adjutant_sessions::{title_from_message, TurnRecord};

use crate::api::auth::AuthedUser;
use crate::api::ApiError;
use crate::prompt::build_system_prompt;
use crate::runtime::{run_turn, ImageAttachment, TurnInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Base64 image attachments accompanying the message.
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Continue an existing session; a new one is created when absent.
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

pub async fn chat(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // ── Validation ───────────────────────────────────────────────
    if body.message.trim().is_empty() {
        return Err(ApiError::validation("Message is required"));
    }
    let history = history_to_messages(&body.history)?;

    // ── Pre-flight: completion client must exist ─────────────────
    let Some(provider) = state.completion.clone() else {
        tracing::error!(
            error = state.completion_init_error.as_deref().unwrap_or("unknown"),
            "chat request with no completion client"
        );
        return Err(ApiError::CompletionUnavailable);
    };

    // ── Session: verify ownership or create ──────────────────────
    let session = match &body.session_id {
        Some(session_id) => state
            .sessions
            .get_owned(session_id, &user_id)
            .ok_or_else(|| ApiError::NotFound("Session not found".into()))?,
        None => state
            .sessions
            .create(&user_id, &title_from_message(&body.message))
            .map_err(|e| ApiError::Internal(format!("failed to create session: {e}")))?,
    };

    // ── Capabilities → tools + system prompt ─────────────────────
    let snapshot = state.capabilities.resolve(&user_id);
    let tools = visible_tools(&snapshot);
    let summary = capability::summary(&snapshot);
    let settings = state.settings.get(&user_id);
    let system_prompt = build_system_prompt(
        &state.config.assistant,
        &settings,
        summary.as_deref(),
        chrono::Utc::now(),
    );

    // ── Run the orchestration loop ───────────────────────────────
    let turn_span = tracing::info_span!(
        "turn",
        session_id = %session.session_id,
        tool_count = tools.len(),
    );

    let input = TurnInput {
        user_id: user_id.clone(),
        message: body.message.clone(),
        images: body.images,
        history,
        system_prompt,
        tools,
        max_tokens: state.config.completion.max_tokens,
    };
    let outcome = {
        use tracing::Instrument;
        run_turn(provider.as_ref(), state.broker.as_ref(), input)
            .instrument(turn_span)
            .await?
    };

    // ── Best-effort persistence: the answer is returned even when
    //    saving the exchange fails. ────────────────────────────────
    if let Err(e) = state
        .transcripts
        .append(&session.session_id, &TurnRecord::user(&body.message))
    {
        tracing::warn!(session_id = %session.session_id, error = %e, "failed to save user turn");
    }
    if let Err(e) = state.transcripts.append(
        &session.session_id,
        &TurnRecord::assistant(
            &outcome.text,
            outcome.usage.input_tokens,
            outcome.usage.output_tokens,
            outcome.tools_used.clone(),
        ),
    ) {
        tracing::warn!(session_id = %session.session_id, error = %e, "failed to save assistant turn");
    }
    if let Err(e) = state.sessions.touch(&session.session_id) {
        tracing::warn!(session_id = %session.session_id, error = %e, "failed to touch session");
    }

    // ── Response ─────────────────────────────────────────────────
    let mut response = json!({
        "content": outcome.text,
        "usage": {
            "inputTokens": outcome.usage.input_tokens,
            "outputTokens": outcome.usage.output_tokens,
        },
        "sessionId": session.session_id,
    });
    if !outcome.tools_used.is_empty() {
        response["toolsUsed"] = json!(outcome.tools_used);
    }
    Ok(Json(response))
}

fn history_to_messages(history: &[HistoryTurn]) -> Result<Vec<Message>, ApiError> {
    history
        .iter()
        .map(|turn| match turn.role.as_str() {
            "user" => Ok(Message::user(&turn.content)),
            "assistant" => Ok(Message::assistant(&turn.content)),
            other => Err(ApiError::validation(format!(
                "invalid history role: {other}"
            ))),
        })
        .collect()
}
