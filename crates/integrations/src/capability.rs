//! Capability resolution — which integrations a user can exercise right now.
//!
//! A pure read over the credential store, computed fresh per conversation
//! turn. Lookup failures degrade to "not connected"; resolution never fails
//! the turn.

use std::sync::Arc;

use adjutant_credentials::CredentialStore;
use adjutant_domain::capability::{CapabilitySnapshot, Provider};

pub struct CapabilityResolver {
    store: Arc<CredentialStore>,
}

impl CapabilityResolver {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Compute the capability snapshot for a user.
    pub fn resolve(&self, user_id: &str) -> CapabilitySnapshot {
        let mut snapshot = CapabilitySnapshot::default();
        for info in self.store.list_for_user(user_id) {
            match info.provider {
                Provider::Google => {
                    snapshot.google = true;
                    snapshot.google_scopes = info.scopes;
                }
                Provider::Asana => snapshot.asana = true,
                Provider::Fireflies => snapshot.fireflies = true,
            }
        }
        snapshot
    }
}

/// Natural-language summary of the user's connected capabilities for the
/// model's system instructions. `None` when nothing is connected — the
/// prompt builder then states that no integrations are available.
pub fn summary(snapshot: &CapabilitySnapshot) -> Option<String> {
    let mut capabilities: Vec<&str> = Vec::new();

    if snapshot.has_gmail_scope() {
        capabilities.push("- Search and read Gmail emails");
        capabilities.push("- Send emails on your behalf (with confirmation)");
    }
    if snapshot.has_calendar_scope() {
        capabilities.push("- View and manage Google Calendar events");
        capabilities.push("- Create and update calendar events");
    }
    if snapshot.asana {
        capabilities.push("- View and manage Asana tasks");
        capabilities.push("- Create new tasks and mark tasks complete");
    }
    if snapshot.fireflies {
        capabilities.push("- Access Fireflies.ai meeting transcripts");
        capabilities.push("- Search and retrieve meeting summaries, action items, and keywords");
    }

    if capabilities.is_empty() {
        return None;
    }

    Some(format!(
        "Connected integrations allow me to:\n{}",
        capabilities.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adjutant_credentials::{NewCredential, TokenCipher};

    fn resolver_with_store(dir: &std::path::Path) -> (CapabilityResolver, Arc<CredentialStore>) {
        let store = Arc::new(
            CredentialStore::open(dir, TokenCipher::from_secret("cap-test").unwrap()).unwrap(),
        );
        (CapabilityResolver::new(store.clone()), store)
    }

    fn credential(scopes: Vec<String>) -> NewCredential {
        NewCredential {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
            scopes,
            connected_account: None,
        }
    }

    #[test]
    fn no_credentials_means_empty_snapshot_and_no_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let (resolver, _) = resolver_with_store(tmp.path());

        let snapshot = resolver.resolve("user-1");
        assert!(snapshot.is_empty());
        assert!(summary(&snapshot).is_none());
    }

    #[test]
    fn google_connection_carries_scopes_into_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let (resolver, store) = resolver_with_store(tmp.path());
        store
            .upsert(
                "user-1",
                Provider::Google,
                credential(vec![
                    "https://www.googleapis.com/auth/gmail.readonly".into(),
                    "https://www.googleapis.com/auth/calendar".into(),
                ]),
            )
            .unwrap();

        let snapshot = resolver.resolve("user-1");
        assert!(snapshot.google);
        assert!(snapshot.has_gmail_scope());
        assert!(snapshot.has_calendar_scope());
        assert!(!snapshot.asana);

        let text = summary(&snapshot).unwrap();
        assert!(text.contains("Gmail"));
        assert!(text.contains("Calendar"));
        assert!(!text.contains("Asana"));
    }

    #[test]
    fn snapshots_are_per_user() {
        let tmp = tempfile::tempdir().unwrap();
        let (resolver, store) = resolver_with_store(tmp.path());
        store.upsert("user-1", Provider::Asana, credential(vec![])).unwrap();

        assert!(resolver.resolve("user-1").asana);
        assert!(resolver.resolve("user-2").is_empty());
    }

    #[test]
    fn fireflies_key_surfaces_transcript_capability() {
        let tmp = tempfile::tempdir().unwrap();
        let (resolver, store) = resolver_with_store(tmp.path());
        store.upsert("user-1", Provider::Fireflies, credential(vec![])).unwrap();

        let snapshot = resolver.resolve("user-1");
        assert!(snapshot.fireflies);
        let text = summary(&snapshot).unwrap();
        assert!(text.contains("meeting transcripts"));
    }
}
