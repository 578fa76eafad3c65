//! Per-user assistant settings (name, personality, timezone), backed by
//! `settings.json` under the state path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use adjutant_domain::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub assistant_name: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<HashMap<String, UserSettings>>,
}

impl SettingsStore {
    pub fn open(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("settings.json");

        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self { path, settings: RwLock::new(settings) })
    }

    /// A user's settings; defaults when they've never saved any.
    pub fn get(&self, user_id: &str) -> UserSettings {
        self.settings.read().get(user_id).cloned().unwrap_or_default()
    }

    pub fn set(&self, user_id: &str, settings: UserSettings) -> Result<()> {
        let mut map = self.settings.write();
        map.insert(user_id.to_owned(), settings);
        let json = serde_json::to_string_pretty(&*map)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_user_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(tmp.path()).unwrap();
        let settings = store.get("nobody");
        assert!(settings.assistant_name.is_none());
        assert!(settings.timezone.is_none());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(tmp.path()).unwrap();
        store
            .set(
                "user-1",
                UserSettings {
                    assistant_name: Some("Jarvis".into()),
                    personality: Some("dry wit".into()),
                    timezone: Some("Europe/Berlin".into()),
                },
            )
            .unwrap();

        let settings = store.get("user-1");
        assert_eq!(settings.assistant_name.as_deref(), Some("Jarvis"));
        assert_eq!(settings.timezone.as_deref(), Some("Europe/Berlin"));
    }
}
