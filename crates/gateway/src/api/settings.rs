//! Assistant settings endpoints (name, personality, timezone).

use axum::extract::State;
use axum::response::Json;

use adjutant_sessions::UserSettings;

use crate::api::auth::AuthedUser;
use crate::api::ApiError;
use crate::state::AppState;

pub async fn get_settings(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
) -> Json<UserSettings> {
    Json(state.settings.get(&user_id))
}

pub async fn put_settings(
    State(state): State<AppState>,
    AuthedUser(user_id): AuthedUser,
    Json(body): Json<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    if let Some(tz) = body.timezone.as_deref().filter(|t| !t.trim().is_empty()) {
        if tz.parse::<chrono_tz::Tz>().is_err() {
            return Err(ApiError::validation(format!("unknown timezone: {tz}")));
        }
    }

    state
        .settings
        .set(&user_id, body.clone())
        .map_err(|e| ApiError::Internal(format!("failed to save settings: {e}")))?;
    Ok(Json(body))
}
