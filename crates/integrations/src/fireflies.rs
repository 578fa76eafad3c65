//! Fireflies.ai adapter — meeting-transcript access over the Fireflies
//! GraphQL API, authenticated with a user-supplied API key.
//!
//! Results are rendered as markdown text rather than raw JSON: transcript
//! detail pages are large, and the preview/cap rules below keep them inside
//! the model's context budget.

use serde_json::{json, Value};

use adjutant_domain::capability::Provider;
use adjutant_domain::error::{Error, Result};
use adjutant_domain::tool::{ToolDefinition, ToolOutcome};

use crate::Ctx;

const FIREFLIES_ENDPOINT: &str = "https://api.fireflies.ai/graphql";

const MAX_TRANSCRIPTS_CAP: u32 = 50;
/// Number of transcript sentences included in a detail view.
const PREVIEW_SENTENCES: usize = 20;

const NOT_CONNECTED: &str =
    "Fireflies.ai is not connected. Please add your API key in Settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirefliesOp {
    ListTranscripts,
    GetTranscript,
    SearchTranscripts,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_fireflies_transcripts".into(),
            description: "List recent meeting transcripts from Fireflies.ai. Returns meeting \
                          titles, dates, durations, and participants."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of transcripts to return (1-50, default 10)"
                    },
                    "fromDate": {
                        "type": "string",
                        "description": "Only return transcripts from after this date (ISO 8601 format, e.g., 2024-01-01)"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "get_fireflies_transcript".into(),
            description: "Get a specific meeting transcript with full details including \
                          summary, action items, keywords, and the conversation text."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "transcriptId": { "type": "string", "description": "The ID of the transcript to retrieve" }
                },
                "required": ["transcriptId"]
            }),
        },
        ToolDefinition {
            name: "search_fireflies_transcripts".into(),
            description: "Search meeting transcripts by keyword. Searches both meeting titles \
                          and spoken content."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "keyword": { "type": "string", "description": "The search term to look for in transcripts" },
                    "limit": { "type": "number", "description": "Maximum number of results to return (default 10)" }
                },
                "required": ["keyword"]
            }),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GraphQL client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Execute one GraphQL query. Transport failures, non-2xx statuses, and
/// GraphQL-level errors all surface as `Err`.
pub async fn fireflies_query(
    http: &reqwest::Client,
    api_key: &str,
    query: &str,
    variables: Value,
) -> Result<Value> {
    let resp = http
        .post(FIREFLIES_ENDPOINT)
        .bearer_auth(api_key)
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("Fireflies request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Http(format!(
            "Fireflies API error: {}",
            status.as_u16()
        )));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| Error::Http(format!("Fireflies response unreadable: {e}")))?;

    if let Some(errors) = body.get("errors").and_then(|v| v.as_array()) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Fireflies API error");
            return Err(Error::Http(message.to_owned()));
        }
    }

    Ok(body.get("data").cloned().unwrap_or(Value::Null))
}

/// Whether an API key is accepted by the Fireflies API. Used by the
/// settings endpoint before a key is stored.
pub async fn verify_api_key(http: &reqwest::Client, api_key: &str) -> bool {
    fireflies_query(http, api_key, "query { user { email name } }", Value::Null)
        .await
        .is_ok()
}

const LIST_QUERY: &str = "query Transcripts($limit: Int, $fromDate: DateTime) { \
    transcripts(limit: $limit, fromDate: $fromDate) { \
    id title date duration participants host_email organizer_email \
    transcript_url audio_url } }";

const SEARCH_QUERY: &str = "query SearchTranscripts($keyword: String!, $limit: Int) { \
    transcripts(keyword: $keyword, limit: $limit, scope: all) { \
    id title date duration participants host_email organizer_email \
    transcript_url audio_url } }";

const DETAIL_QUERY: &str = "query Transcript($transcriptId: String!) { \
    transcript(id: $transcriptId) { \
    id title date duration participants host_email organizer_email \
    transcript_url audio_url \
    summary { overview action_items keywords } \
    sentences { speaker_name text start_time } } }";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) async fn handle(ctx: &Ctx<'_>, op: FirefliesOp, input: &Value) -> ToolOutcome {
    let Some(api_key) = ctx.tokens.valid_access_token(ctx.user_id, Provider::Fireflies).await
    else {
        return ToolOutcome::err(NOT_CONNECTED);
    };

    match op {
        FirefliesOp::ListTranscripts => list_transcripts(ctx, &api_key, input).await,
        FirefliesOp::GetTranscript => get_transcript(ctx, &api_key, input).await,
        FirefliesOp::SearchTranscripts => search_transcripts(ctx, &api_key, input).await,
    }
}

async fn list_transcripts(ctx: &Ctx<'_>, api_key: &str, input: &Value) -> ToolOutcome {
    let limit = limit_from(input, 10);
    let variables = json!({
        "limit": limit,
        "fromDate": input.get("fromDate"),
    });

    match fireflies_query(ctx.http, api_key, LIST_QUERY, variables).await {
        Ok(data) => {
            let transcripts = transcript_array(&data);
            ToolOutcome::ok(Value::String(format_transcript_list(&transcripts)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "fireflies list failed");
            ToolOutcome::err(e.to_string())
        }
    }
}

async fn get_transcript(ctx: &Ctx<'_>, api_key: &str, input: &Value) -> ToolOutcome {
    let Some(transcript_id) = input.get("transcriptId").and_then(|v| v.as_str()) else {
        return ToolOutcome::err("invalid get_fireflies_transcript input: transcriptId is required");
    };

    match fireflies_query(
        ctx.http,
        api_key,
        DETAIL_QUERY,
        json!({ "transcriptId": transcript_id }),
    )
    .await
    {
        Ok(data) => match data.get("transcript").filter(|t| !t.is_null()) {
            Some(transcript) => {
                ToolOutcome::ok(Value::String(format_transcript_detail(transcript)))
            }
            None => ToolOutcome::err(format!(
                "Transcript with ID \"{transcript_id}\" not found."
            )),
        },
        Err(e) => {
            tracing::warn!(error = %e, "fireflies get failed");
            ToolOutcome::err(e.to_string())
        }
    }
}

async fn search_transcripts(ctx: &Ctx<'_>, api_key: &str, input: &Value) -> ToolOutcome {
    let Some(keyword) = input.get("keyword").and_then(|v| v.as_str()) else {
        return ToolOutcome::err("invalid search_fireflies_transcripts input: keyword is required");
    };
    let limit = limit_from(input, 10);

    match fireflies_query(
        ctx.http,
        api_key,
        SEARCH_QUERY,
        json!({ "keyword": keyword, "limit": limit }),
    )
    .await
    {
        Ok(data) => {
            let transcripts = transcript_array(&data);
            if transcripts.is_empty() {
                return ToolOutcome::ok(Value::String(format!(
                    "No transcripts found matching \"{keyword}\"."
                )));
            }
            ToolOutcome::ok(Value::String(format!(
                "Found {} transcript(s) matching \"{keyword}\":\n\n{}",
                transcripts.len(),
                format_transcript_list(&transcripts)
            )))
        }
        Err(e) => {
            tracing::warn!(error = %e, "fireflies search failed");
            ToolOutcome::err(e.to_string())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Formatting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn limit_from(input: &Value, default: u32) -> u32 {
    input
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .unwrap_or(default)
        .min(MAX_TRANSCRIPTS_CAP)
}

fn transcript_array(data: &Value) -> Vec<Value> {
    data.get("transcripts")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn str_field<'a>(t: &'a Value, field: &str) -> &'a str {
    t.get(field).and_then(|v| v.as_str()).unwrap_or("Unknown")
}

fn duration_minutes(t: &Value) -> u64 {
    let seconds = t.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0);
    (seconds / 60.0).round() as u64
}

fn participants(t: &Value) -> String {
    t.get("participants")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_owned())
}

fn format_transcript_list(transcripts: &[Value]) -> String {
    if transcripts.is_empty() {
        return "No transcripts found.".to_owned();
    }

    transcripts
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "{}. **{}**\n   - ID: {}\n   - Date: {}\n   - Duration: {} minutes\n   - Participants: {}",
                i + 1,
                str_field(t, "title"),
                str_field(t, "id"),
                str_field(t, "date"),
                duration_minutes(t),
                participants(t),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_transcript_detail(t: &Value) -> String {
    let mut out = format!(
        "# {}\n\n**Date:** {}\n**Duration:** {} minutes\n**Participants:** {}\n**Host:** {}\n",
        str_field(t, "title"),
        str_field(t, "date"),
        duration_minutes(t),
        participants(t),
        str_field(t, "host_email"),
    );

    let summary = t.get("summary").filter(|s| !s.is_null());

    if let Some(overview) = summary
        .and_then(|s| s.get("overview"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
    {
        out.push_str(&format!("\n## Summary\n{overview}\n"));
    }

    if let Some(items) = summary
        .and_then(|s| s.get("action_items"))
        .and_then(|v| v.as_array())
        .filter(|v| !v.is_empty())
    {
        let lines: Vec<String> = items
            .iter()
            .filter_map(|i| i.as_str())
            .map(|i| format!("- {i}"))
            .collect();
        out.push_str(&format!("\n## Action Items\n{}\n", lines.join("\n")));
    }

    if let Some(keywords) = summary
        .and_then(|s| s.get("keywords"))
        .and_then(|v| v.as_array())
        .filter(|v| !v.is_empty())
    {
        let words: Vec<&str> = keywords.iter().filter_map(|k| k.as_str()).collect();
        out.push_str(&format!("\n## Keywords\n{}\n", words.join(", ")));
    }

    if let Some(sentences) = t.get("sentences").and_then(|v| v.as_array()) {
        if !sentences.is_empty() {
            let preview: Vec<String> = sentences
                .iter()
                .take(PREVIEW_SENTENCES)
                .map(|s| {
                    format!(
                        "**{}:** {}",
                        str_field(s, "speaker_name"),
                        s.get("text").and_then(|v| v.as_str()).unwrap_or("")
                    )
                })
                .collect();
            out.push_str(&format!(
                "\n## Transcript Preview (first {} statements)\n{}\n",
                preview.len(),
                preview.join("\n")
            ));
            if sentences.len() > PREVIEW_SENTENCES {
                out.push_str(&format!(
                    "\n*... and {} more statements. Use transcript_url to access the full transcript.*",
                    sentences.len() - PREVIEW_SENTENCES
                ));
            }
        }
    }

    out.push_str(&format!(
        "\n---\n**Transcript URL:** {}\n**Audio URL:** {}",
        t.get("transcript_url").and_then(|v| v.as_str()).unwrap_or("Not available"),
        t.get("audio_url").and_then(|v| v.as_str()).unwrap_or("Not available"),
    ));

    out
}
