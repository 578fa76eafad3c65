//! Session metadata store, backed by `sessions.json` under the state path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use adjutant_domain::error::{Error, Result};

/// A single chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive a session title from the first user message: the first 50
/// characters, with an ellipsis when clipped.
pub fn title_from_message(message: &str) -> String {
    const TITLE_CHARS: usize = 50;
    let mut iter = message.char_indices();
    match iter.nth(TITLE_CHARS) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_owned(),
    }
}

/// JSON-file-backed session store.
pub struct SessionStore {
    path: PathBuf,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions.json`.
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("sessions.json");

        let sessions = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %path.display(),
            "session store loaded"
        );

        Ok(Self { path, sessions: RwLock::new(sessions) })
    }

    /// Create a new session for a user.
    pub fn create(&self, user_id: &str, title: &str) -> Result<SessionEntry> {
        let now = Utc::now();
        let entry = SessionEntry {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
        };

        let mut sessions = self.sessions.write();
        sessions.insert(entry.session_id.clone(), entry.clone());
        self.persist(&sessions)?;
        Ok(entry)
    }

    /// Look up a session only if it belongs to the given user.
    pub fn get_owned(&self, session_id: &str, user_id: &str) -> Option<SessionEntry> {
        let sessions = self.sessions.read();
        sessions
            .get(session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
    }

    /// All sessions for a user, most recently updated first.
    pub fn list_for_user(&self, user_id: &str) -> Vec<SessionEntry> {
        let sessions = self.sessions.read();
        let mut list: Vec<SessionEntry> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    /// Bump a session's `updated_at`.
    pub fn touch(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write();
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.updated_at = Utc::now();
            self.persist(&sessions)?;
        }
        Ok(())
    }

    fn persist(&self, sessions: &HashMap<String, SessionEntry>) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}
