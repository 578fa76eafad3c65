//! Conversation-history endpoints.

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::json;

use crate::api::auth::AuthedUser;
use crate::api::ApiError;
use crate::state::AppState;

/// `GET /v1/sessions` — the caller's sessions, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> Json<serde_json::Value> {
    let sessions = state.sessions.list_for_user(&user_id);
    Json(json!({ "sessions": sessions }))
}

/// `GET /v1/sessions/{session_id}` — one session plus its transcript.
/// Owner-checked: foreign sessions read as not found.
pub async fn session_detail(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .sessions
        .get_owned(&session_id, &user_id)
        .ok_or_else(|| ApiError::NotFound("Session not found".into()))?;

    let turns = state.transcripts.read(&session.session_id);
    Ok(Json(json!({ "session": session, "turns": turns })))
}
