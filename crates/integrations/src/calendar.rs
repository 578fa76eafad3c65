//! Google Calendar adapter — list, read, create, and update events.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use adjutant_domain::capability::Provider;
use adjutant_domain::tool::{ToolDefinition, ToolOutcome};

use crate::Ctx;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const MAX_RESULTS_CAP: u32 = 50;

const NOT_CONNECTED: &str =
    "Google Calendar is not connected or the connection has expired. Please reconnect in settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarOp {
    ListEvents,
    GetEvent,
    CreateEvent,
    UpdateEvent,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_calendar_events".into(),
            description: "List upcoming calendar events from the user's Google Calendar. \
                          Returns events within a specified time range."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeMin": {
                        "type": "string",
                        "description": "Start time for the query in ISO 8601 format (e.g., '2024-01-15T00:00:00Z'). Defaults to now."
                    },
                    "timeMax": {
                        "type": "string",
                        "description": "End time for the query in ISO 8601 format. Defaults to 7 days from now."
                    },
                    "maxResults": {
                        "type": "number",
                        "description": "Maximum number of events to return (default: 10, max: 50)"
                    },
                    "calendarId": {
                        "type": "string",
                        "description": "Calendar ID to query (default: 'primary')"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "get_calendar_event".into(),
            description: "Get detailed information about a specific calendar event by its ID."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "eventId": { "type": "string", "description": "The Google Calendar event ID" },
                    "calendarId": { "type": "string", "description": "Calendar ID (default: 'primary')" }
                },
                "required": ["eventId"]
            }),
        },
        ToolDefinition {
            name: "create_calendar_event".into(),
            description: "Create a new event on the user's Google Calendar. Requires at \
                          minimum a summary/title and start time."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "description": "Event title/summary" },
                    "description": { "type": "string", "description": "Event description (optional)" },
                    "location": { "type": "string", "description": "Event location (optional)" },
                    "startDateTime": {
                        "type": "string",
                        "description": "Start time in ISO 8601 format (e.g., '2024-01-15T10:00:00-07:00')"
                    },
                    "endDateTime": {
                        "type": "string",
                        "description": "End time in ISO 8601 format. If not provided, defaults to 1 hour after start."
                    },
                    "attendees": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "List of attendee email addresses (optional)"
                    },
                    "calendarId": { "type": "string", "description": "Calendar ID (default: 'primary')" }
                },
                "required": ["summary", "startDateTime"]
            }),
        },
        ToolDefinition {
            name: "update_calendar_event".into(),
            description: "Update an existing calendar event. Only provided fields will be \
                          updated."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "eventId": { "type": "string", "description": "The Google Calendar event ID to update" },
                    "summary": { "type": "string", "description": "New event title/summary" },
                    "description": { "type": "string", "description": "New event description" },
                    "location": { "type": "string", "description": "New event location" },
                    "startDateTime": { "type": "string", "description": "New start time in ISO 8601 format" },
                    "endDateTime": { "type": "string", "description": "New end time in ISO 8601 format" },
                    "calendarId": { "type": "string", "description": "Calendar ID (default: 'primary')" }
                },
                "required": ["eventId"]
            }),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInput {
    time_min: Option<String>,
    time_max: Option<String>,
    max_results: Option<u32>,
    calendar_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetInput {
    event_id: String,
    calendar_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInput {
    summary: String,
    start_date_time: String,
    end_date_time: Option<String>,
    description: Option<String>,
    location: Option<String>,
    attendees: Option<Vec<String>>,
    calendar_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInput {
    event_id: String,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start_date_time: Option<String>,
    end_date_time: Option<String>,
    calendar_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) async fn handle(ctx: &Ctx<'_>, op: CalendarOp, input: &Value) -> ToolOutcome {
    let Some(token) = ctx.tokens.valid_access_token(ctx.user_id, Provider::Google).await else {
        return ToolOutcome::err(NOT_CONNECTED);
    };

    match op {
        CalendarOp::ListEvents => match ListInput::deserialize(input) {
            Ok(req) => list_events(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid list_calendar_events input: {e}")),
        },
        CalendarOp::GetEvent => match GetInput::deserialize(input) {
            Ok(req) => get_event(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid get_calendar_event input: {e}")),
        },
        CalendarOp::CreateEvent => match CreateInput::deserialize(input) {
            Ok(req) => create_event(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid create_calendar_event input: {e}")),
        },
        CalendarOp::UpdateEvent => match UpdateInput::deserialize(input) {
            Ok(req) => update_event(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid update_calendar_event input: {e}")),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn list_events(ctx: &Ctx<'_>, token: &str, req: ListInput) -> ToolOutcome {
    let now = Utc::now();
    let time_min = req.time_min.unwrap_or_else(|| now.to_rfc3339());
    let time_max = req
        .time_max
        .unwrap_or_else(|| (now + Duration::days(7)).to_rfc3339());
    let max_results = req.max_results.unwrap_or(10).min(MAX_RESULTS_CAP);
    let calendar_id = req.calendar_id.as_deref().unwrap_or("primary");

    let mut url = match reqwest::Url::parse(&format!(
        "{CALENDAR_API_BASE}/calendars/{calendar_id}/events"
    )) {
        Ok(u) => u,
        Err(e) => return ToolOutcome::err(format!("invalid calendar id: {e}")),
    };
    url.query_pairs_mut()
        .append_pair("timeMin", &time_min)
        .append_pair("timeMax", &time_max)
        .append_pair("maxResults", &max_results.to_string())
        .append_pair("singleEvents", "true")
        .append_pair("orderBy", "startTime");

    let resp = match ctx.http.get(url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "calendar list request failed");
            return ToolOutcome::err("Failed to retrieve calendar events");
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "calendar list rejected");
        return ToolOutcome::err("Failed to retrieve calendar events");
    }

    let data: Value = resp.json().await.unwrap_or_default();
    let events: Vec<Value> = data
        .get("items")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(summarize_event).collect())
        .unwrap_or_default();

    ToolOutcome::ok(json!({
        "events": events,
        "total": events.len(),
        "timeRange": { "from": time_min, "to": time_max },
    }))
}

async fn get_event(ctx: &Ctx<'_>, token: &str, req: GetInput) -> ToolOutcome {
    let calendar_id = req.calendar_id.as_deref().unwrap_or("primary");
    let url = format!(
        "{CALENDAR_API_BASE}/calendars/{calendar_id}/events/{}",
        req.event_id
    );

    let resp = match ctx.http.get(&url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "calendar get request failed");
            return ToolOutcome::err("Failed to retrieve event");
        }
    };
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return ToolOutcome::err("Event not found");
    }
    if !resp.status().is_success() {
        return ToolOutcome::err("Failed to retrieve event");
    }

    let event: Value = resp.json().await.unwrap_or_default();
    let mut detail = summarize_event(&event);
    if let Some(obj) = detail.as_object_mut() {
        obj.insert("organizer".into(), event.get("organizer").cloned().into());
        obj.insert("status".into(), event.get("status").cloned().into());
        obj.insert("created".into(), event.get("created").cloned().into());
        obj.insert("updated".into(), event.get("updated").cloned().into());
    }
    ToolOutcome::ok(detail)
}

async fn create_event(ctx: &Ctx<'_>, token: &str, req: CreateInput) -> ToolOutcome {
    let start = match parse_datetime(&req.start_date_time) {
        Ok(t) => t,
        Err(msg) => return ToolOutcome::err(msg),
    };
    // Default duration: one hour.
    let end = match &req.end_date_time {
        Some(raw) => match parse_datetime(raw) {
            Ok(t) => t,
            Err(msg) => return ToolOutcome::err(msg),
        },
        None => start + Duration::hours(1),
    };

    let mut body = json!({
        "summary": req.summary,
        "start": { "dateTime": start.to_rfc3339() },
        "end": { "dateTime": end.to_rfc3339() },
    });
    if let Some(description) = &req.description {
        body["description"] = json!(description);
    }
    if let Some(location) = &req.location {
        body["location"] = json!(location);
    }
    if let Some(attendees) = &req.attendees {
        if !attendees.is_empty() {
            body["attendees"] = json!(attendees
                .iter()
                .map(|email| json!({ "email": email }))
                .collect::<Vec<_>>());
        }
    }

    let calendar_id = req.calendar_id.as_deref().unwrap_or("primary");
    let url = format!("{CALENDAR_API_BASE}/calendars/{calendar_id}/events");

    let resp = match ctx.http.post(&url).bearer_auth(token).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "calendar create request failed");
            return ToolOutcome::err("Failed to create calendar event");
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "calendar create rejected");
        return ToolOutcome::err("Failed to create calendar event");
    }

    let event: Value = resp.json().await.unwrap_or_default();
    ToolOutcome::ok(json!({
        "id": event.get("id"),
        "summary": event.get("summary"),
        "start": event_time(&event, "start"),
        "end": event_time(&event, "end"),
        "link": event.get("htmlLink"),
        "message": format!("Event \"{}\" created successfully", req.summary),
    }))
}

async fn update_event(ctx: &Ctx<'_>, token: &str, req: UpdateInput) -> ToolOutcome {
    let calendar_id = req.calendar_id.as_deref().unwrap_or("primary").to_owned();
    let url = format!(
        "{CALENDAR_API_BASE}/calendars/{calendar_id}/events/{}",
        req.event_id
    );

    // Read-modify-write: fetch the current event, overlay the provided
    // fields, PUT the merged body back.
    let resp = match ctx.http.get(&url).bearer_auth(token).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "calendar update fetch failed");
            return ToolOutcome::err("Failed to retrieve event for update");
        }
    };
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return ToolOutcome::err("Event not found");
    }
    if !resp.status().is_success() {
        return ToolOutcome::err("Failed to retrieve event for update");
    }
    let current: Value = resp.json().await.unwrap_or_default();

    let start = match &req.start_date_time {
        Some(raw) => match parse_datetime(raw) {
            Ok(t) => json!({ "dateTime": t.to_rfc3339() }),
            Err(msg) => return ToolOutcome::err(msg),
        },
        None => current.get("start").cloned().unwrap_or(Value::Null),
    };
    let end = match &req.end_date_time {
        Some(raw) => match parse_datetime(raw) {
            Ok(t) => json!({ "dateTime": t.to_rfc3339() }),
            Err(msg) => return ToolOutcome::err(msg),
        },
        None => current.get("end").cloned().unwrap_or(Value::Null),
    };

    let body = json!({
        "summary": req.summary.clone().map(Value::from).unwrap_or_else(|| current.get("summary").cloned().unwrap_or(Value::Null)),
        "description": req.description.clone().map(Value::from).unwrap_or_else(|| current.get("description").cloned().unwrap_or(Value::Null)),
        "location": req.location.clone().map(Value::from).unwrap_or_else(|| current.get("location").cloned().unwrap_or(Value::Null)),
        "start": start,
        "end": end,
    });

    let resp = match ctx.http.put(&url).bearer_auth(token).json(&body).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "calendar update request failed");
            return ToolOutcome::err("Failed to update calendar event");
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "calendar update rejected");
        return ToolOutcome::err("Failed to update calendar event");
    }

    let event: Value = resp.json().await.unwrap_or_default();
    ToolOutcome::ok(json!({
        "id": event.get("id"),
        "summary": event.get("summary"),
        "start": event_time(&event, "start"),
        "end": event_time(&event, "end"),
        "link": event.get("htmlLink"),
        "message": format!(
            "Event \"{}\" updated successfully",
            event.get("summary").and_then(|v| v.as_str()).unwrap_or("(No title)")
        ),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| format!("invalid ISO 8601 timestamp: {raw}"))
}

/// Start/end of an event: timed events carry `dateTime`, all-day events
/// carry `date`.
fn event_time(event: &Value, field: &str) -> Value {
    event
        .get(field)
        .and_then(|t| t.get("dateTime").or_else(|| t.get("date")))
        .cloned()
        .unwrap_or(Value::Null)
}

fn summarize_event(event: &Value) -> Value {
    let is_all_day = event
        .get("start")
        .map(|s| s.get("dateTime").is_none())
        .unwrap_or(true);

    let attendees = event.get("attendees").and_then(|v| v.as_array()).map(|list| {
        list.iter()
            .map(|a| {
                json!({
                    "email": a.get("email"),
                    "name": a.get("displayName"),
                    "status": a.get("responseStatus"),
                })
            })
            .collect::<Vec<_>>()
    });

    json!({
        "id": event.get("id"),
        "summary": event.get("summary").and_then(|v| v.as_str()).unwrap_or("(No title)"),
        "description": event.get("description"),
        "location": event.get("location"),
        "start": event_time(event, "start"),
        "end": event_time(event, "end"),
        "isAllDay": is_all_day,
        "attendees": attendees,
        "link": event.get("htmlLink"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_handles_timed_and_all_day_events() {
        let timed = json!({
            "id": "e1",
            "summary": "Standup",
            "start": { "dateTime": "2024-01-15T10:00:00Z" },
            "end": { "dateTime": "2024-01-15T10:30:00Z" },
        });
        let s = summarize_event(&timed);
        assert_eq!(s["isAllDay"], false);
        assert_eq!(s["start"], "2024-01-15T10:00:00Z");

        let all_day = json!({
            "id": "e2",
            "start": { "date": "2024-01-15" },
            "end": { "date": "2024-01-16" },
        });
        let s = summarize_event(&all_day);
        assert_eq!(s["isAllDay"], true);
        assert_eq!(s["summary"], "(No title)");
        assert_eq!(s["start"], "2024-01-15");
    }

    #[test]
    fn datetime_parsing_accepts_offsets_and_rejects_junk() {
        assert!(parse_datetime("2024-01-15T10:00:00-07:00").is_ok());
        assert!(parse_datetime("2024-01-15T10:00:00Z").is_ok());
        assert!(parse_datetime("tomorrow at noon").is_err());
    }

    #[test]
    fn list_input_tolerates_missing_fields() {
        let req = ListInput::deserialize(&json!({})).unwrap();
        assert!(req.time_min.is_none());
        assert!(req.max_results.is_none());
    }

    #[test]
    fn create_input_requires_summary_and_start() {
        assert!(CreateInput::deserialize(&json!({ "summary": "x" })).is_err());
        assert!(CreateInput::deserialize(&json!({
            "summary": "x",
            "startDateTime": "2024-01-15T10:00:00Z"
        }))
        .is_ok());
    }
}
