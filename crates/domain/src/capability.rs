use serde::{Deserialize, Serialize};

/// External integration providers the assistant can act against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Asana,
    Fireflies,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Asana => "asana",
            Provider::Fireflies => "fireflies",
        }
    }

    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "google" => Some(Provider::Google),
            "asana" => Some(Provider::Asana),
            "fireflies" => Some(Provider::Fireflies),
            _ => None,
        }
    }

    /// Whether credentials for this provider come from an OAuth
    /// authorization-code flow (Fireflies uses a user-supplied API key).
    pub fn is_oauth(&self) -> bool {
        !matches!(self, Provider::Fireflies)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of integrations a user can currently exercise, computed fresh at
/// the start of each conversation turn. Derived state — never persisted.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySnapshot {
    pub google: bool,
    pub asana: bool,
    pub fireflies: bool,
    /// Scopes granted on the Google credential (empty if not connected).
    pub google_scopes: Vec<String>,
}

impl CapabilitySnapshot {
    pub fn has_gmail_scope(&self) -> bool {
        self.google
            && self.google_scopes.iter().any(|s| {
                s.contains("gmail.readonly")
                    || s.contains("gmail.modify")
                    || s.contains("gmail.send")
                    || s.contains("mail.google.com")
            })
    }

    pub fn has_calendar_scope(&self) -> bool {
        self.google && self.google_scopes.iter().any(|s| s.contains("calendar"))
    }

    /// True when no integration of any kind is connected.
    pub fn is_empty(&self) -> bool {
        !self.google && !self.asana && !self.fireflies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_roundtrip() {
        for p in [Provider::Google, Provider::Asana, Provider::Fireflies] {
            assert_eq!(Provider::parse(p.as_str()), Some(p));
        }
        assert_eq!(Provider::parse("slack"), None);
    }

    #[test]
    fn gmail_scope_detection() {
        let snapshot = CapabilitySnapshot {
            google: true,
            google_scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".into(),
                "https://www.googleapis.com/auth/userinfo.email".into(),
            ],
            ..Default::default()
        };
        assert!(snapshot.has_gmail_scope());
        assert!(!snapshot.has_calendar_scope());
    }

    #[test]
    fn scopes_without_connection_grant_nothing() {
        let snapshot = CapabilitySnapshot {
            google: false,
            google_scopes: vec!["https://www.googleapis.com/auth/calendar".into()],
            ..Default::default()
        };
        assert!(!snapshot.has_calendar_scope());
        assert!(snapshot.is_empty());
    }
}
