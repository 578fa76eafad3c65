//! Chat-session persistence: session metadata, per-session transcripts, and
//! user settings.
//!
//! All stores here are collaborator surfaces, not core state machines —
//! JSON-file-backed maps with owner checks. Callers in the request path
//! treat write failures as best-effort: log and keep serving.

pub mod settings;
pub mod store;
pub mod transcript;

pub use settings::{SettingsStore, UserSettings};
pub use store::{title_from_message, SessionEntry, SessionStore};
pub use transcript::{TranscriptWriter, TurnRecord};
