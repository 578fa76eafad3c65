//! System-prompt builder.
//!
//! Assembles the model's instructions for a turn: assistant identity, the
//! current date/time in the user's timezone, and the capability section
//! derived from the user's connected integrations.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use adjutant_domain::config::AssistantConfig;
use adjutant_sessions::UserSettings;

/// Build the system instructions for one turn. `capability_summary` is the
/// resolver's natural-language list of connected capabilities, or `None`
/// when the user has nothing connected.
pub fn build_system_prompt(
    cfg: &AssistantConfig,
    settings: &UserSettings,
    capability_summary: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let assistant_name = settings
        .assistant_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&cfg.default_name);

    let timezone_name = settings
        .timezone
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&cfg.default_timezone);
    let tz: Tz = timezone_name.parse().unwrap_or(chrono_tz::America::Phoenix);
    let local = now.with_timezone(&tz);

    let current_date = local.format("%A, %B %-d, %Y");
    let current_time = local.format("%-I:%M %p");

    let capabilities_section = match capability_summary {
        Some(summary) => format!(
            "Your capabilities include:\n\
             - Answering questions and having helpful conversations\n\
             - Remembering information the user shares with you\n\n\
             {summary}\n\n\
             When using tools:\n\
             - Always confirm before sending emails or making significant changes\n\
             - Provide clear summaries of what you found or did\n\
             - If a tool fails, explain the issue and suggest next steps"
        ),
        None => "Your capabilities include:\n\
                 - Answering questions and having helpful conversations\n\
                 - Remembering information the user shares with you\n\n\
                 No integrations are currently connected. The user can connect Gmail, \
                 Google Calendar, and Asana in Settings to unlock additional capabilities."
            .to_owned(),
    };

    let base = format!(
        "You are {assistant_name}, a helpful AI executive assistant. You help the user \
         manage their calendar, emails, and tasks.\n\n\
         Today is {current_date}. The current time is {current_time}. The user's \
         timezone is {timezone_name}.\n\n\
         {capabilities_section}\n\n\
         Be concise, professional, and helpful. If you don't know something, say so."
    );

    match settings.personality.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(personality) => format!(
            "{base}\n\nAdditional personality/communication style notes from the user: {personality}"
        ),
        None => base,
    }
}
