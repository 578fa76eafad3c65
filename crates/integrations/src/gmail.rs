//! Gmail adapter — search, read, and send mail through the Gmail REST API.

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use adjutant_domain::capability::Provider;
use adjutant_domain::tool::{ToolDefinition, ToolOutcome};

use crate::{truncate_str, Ctx};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Hard cap on search result counts, regardless of what the model asks for.
const MAX_RESULTS_CAP: u32 = 50;
/// Email bodies are clipped before being handed back to the model.
const BODY_CAP: usize = 5_000;

const NOT_CONNECTED: &str =
    "Gmail is not connected or the connection has expired. Please reconnect Gmail in settings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmailOp {
    SearchEmails,
    GetEmail,
    SendEmail,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "search_emails".into(),
            description: "Search the user's Gmail inbox using a query string. Returns a list \
                          of matching emails with subject, sender, date, and snippet. Use \
                          standard Gmail search operators like 'from:', 'to:', 'subject:', \
                          'is:unread', 'newer_than:', etc."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Gmail search query (e.g., 'from:john@example.com', 'is:unread', 'subject:meeting newer_than:7d')"
                    },
                    "maxResults": {
                        "type": "number",
                        "description": "Maximum number of emails to return (default: 10, max: 50)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "get_email".into(),
            description: "Get the full details of a specific email by its ID. Returns the \
                          complete email including subject, sender, recipients, date, and \
                          body content."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "emailId": { "type": "string", "description": "The Gmail message ID" }
                },
                "required": ["emailId"]
            }),
        },
        ToolDefinition {
            name: "send_email".into(),
            description: "Send an email on behalf of the user. The email will be sent \
                          immediately. Use this carefully and confirm with the user before \
                          sending."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Recipient email address" },
                    "subject": { "type": "string", "description": "Email subject line" },
                    "body": { "type": "string", "description": "Email body content (plain text)" },
                    "cc": { "type": "string", "description": "CC email address (optional)" },
                    "bcc": { "type": "string", "description": "BCC email address (optional)" }
                },
                "required": ["to", "subject", "body"]
            }),
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(rename = "maxResults")]
    max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GetInput {
    #[serde(rename = "emailId")]
    email_id: String,
}

#[derive(Debug, Deserialize)]
struct SendInput {
    to: String,
    subject: String,
    body: String,
    cc: Option<String>,
    bcc: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) async fn handle(ctx: &Ctx<'_>, op: GmailOp, input: &Value) -> ToolOutcome {
    let Some(token) = ctx.tokens.valid_access_token(ctx.user_id, Provider::Google).await else {
        return ToolOutcome::err(NOT_CONNECTED);
    };

    match op {
        GmailOp::SearchEmails => match SearchInput::deserialize(input) {
            Ok(req) => search_emails(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid search_emails input: {e}")),
        },
        GmailOp::GetEmail => match GetInput::deserialize(input) {
            Ok(req) => get_email(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid get_email input: {e}")),
        },
        GmailOp::SendEmail => match SendInput::deserialize(input) {
            Ok(req) => send_email(ctx, &token, req).await,
            Err(e) => ToolOutcome::err(format!("invalid send_email input: {e}")),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn search_emails(ctx: &Ctx<'_>, token: &str, req: SearchInput) -> ToolOutcome {
    let max_results = req.max_results.unwrap_or(10).min(MAX_RESULTS_CAP);

    let mut url = match reqwest::Url::parse(&format!("{GMAIL_API_BASE}/users/me/messages")) {
        Ok(u) => u,
        Err(e) => return ToolOutcome::err(format!("bad Gmail endpoint: {e}")),
    };
    url.query_pairs_mut()
        .append_pair("q", &req.query)
        .append_pair("maxResults", &max_results.to_string());

    let list: Value = match get_json(ctx, token, url.as_str()).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "gmail search failed");
            return ToolOutcome::err("Failed to search emails");
        }
    };

    let ids: Vec<String> = list
        .get("messages")
        .and_then(|v| v.as_array())
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.get("id").and_then(|v| v.as_str()).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    if ids.is_empty() {
        return ToolOutcome::ok(json!({ "emails": [], "total": 0 }));
    }

    // Fetch headers for each hit concurrently; hits that fail to load are
    // dropped rather than failing the whole search.
    let detail_futures: Vec<_> = ids
        .iter()
        .map(|id| {
            let url = format!(
                "{GMAIL_API_BASE}/users/me/messages/{id}?format=metadata\
                 &metadataHeaders=From&metadataHeaders=To&metadataHeaders=Subject&metadataHeaders=Date"
            );
            async move { get_json(ctx, token, &url).await.ok() }
        })
        .collect();
    let details = futures_util::future::join_all(detail_futures).await;

    let emails: Vec<Value> = details
        .into_iter()
        .flatten()
        .map(|msg| {
            json!({
                "id": msg.get("id"),
                "threadId": msg.get("threadId"),
                "subject": header(&msg, "Subject"),
                "from": header(&msg, "From"),
                "to": header(&msg, "To"),
                "date": header(&msg, "Date"),
                "snippet": msg.get("snippet"),
            })
        })
        .collect();

    ToolOutcome::ok(json!({
        "emails": emails,
        "total": emails.len(),
        "query": req.query,
    }))
}

async fn get_email(ctx: &Ctx<'_>, token: &str, req: GetInput) -> ToolOutcome {
    let url = format!("{GMAIL_API_BASE}/users/me/messages/{}?format=full", req.email_id);

    let msg: Value = match get_json(ctx, token, &url).await {
        Ok(v) => v,
        Err(FetchError::NotFound) => return ToolOutcome::err("Email not found"),
        Err(e) => {
            tracing::warn!(error = %e, "gmail get failed");
            return ToolOutcome::err("Failed to retrieve email");
        }
    };

    let body = extract_body(&msg);

    ToolOutcome::ok(json!({
        "id": msg.get("id"),
        "threadId": msg.get("threadId"),
        "subject": header(&msg, "Subject"),
        "from": header(&msg, "From"),
        "to": header(&msg, "To"),
        "cc": header(&msg, "Cc"),
        "date": header(&msg, "Date"),
        "body": truncate_str(&body, BODY_CAP),
        "snippet": msg.get("snippet"),
    }))
}

async fn send_email(ctx: &Ctx<'_>, token: &str, req: SendInput) -> ToolOutcome {
    let raw = encode_rfc2822(&req);

    let url = format!("{GMAIL_API_BASE}/users/me/messages/send");
    let resp = ctx
        .http
        .post(&url)
        .bearer_auth(token)
        .json(&json!({ "raw": raw }))
        .send()
        .await;

    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "gmail send request failed");
            return ToolOutcome::err("Failed to send email");
        }
    };

    if !resp.status().is_success() {
        tracing::warn!(status = %resp.status(), "gmail send rejected");
        return ToolOutcome::err("Failed to send email");
    }

    let result: Value = resp.json().await.unwrap_or_default();

    ToolOutcome::ok(json!({
        "messageId": result.get("id"),
        "threadId": result.get("threadId"),
        "message": format!("Email sent successfully to {}", req.to),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum FetchError {
    NotFound,
    Other(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound => f.write_str("not found"),
            FetchError::Other(msg) => f.write_str(msg),
        }
    }
}

async fn get_json(ctx: &Ctx<'_>, token: &str, url: &str) -> Result<Value, FetchError> {
    let resp = ctx
        .http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| FetchError::Other(e.to_string()))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound);
    }
    if !resp.status().is_success() {
        return Err(FetchError::Other(format!("HTTP {}", resp.status().as_u16())));
    }
    resp.json().await.map_err(|e| FetchError::Other(e.to_string()))
}

fn header(msg: &Value, name: &str) -> String {
    msg.get("payload")
        .and_then(|p| p.get("headers"))
        .and_then(|h| h.as_array())
        .and_then(|headers| {
            headers.iter().find_map(|h| {
                let hname = h.get("name")?.as_str()?;
                if hname.eq_ignore_ascii_case(name) {
                    h.get("value")?.as_str().map(str::to_owned)
                } else {
                    None
                }
            })
        })
        .unwrap_or_default()
}

/// Pull the plain-text body out of a full-format Gmail message: top-level
/// body data, else the first text/plain part, else text/html stripped of
/// tags.
fn extract_body(msg: &Value) -> String {
    let payload = match msg.get("payload") {
        Some(p) => p,
        None => return String::new(),
    };

    if let Some(data) = payload.get("body").and_then(|b| b.get("data")).and_then(|d| d.as_str()) {
        return decode_body(data);
    }

    let parts = payload.get("parts").and_then(|p| p.as_array());
    if let Some(parts) = parts {
        let find_part = |mime: &str| {
            parts
                .iter()
                .find(|p| p.get("mimeType").and_then(|m| m.as_str()) == Some(mime))
        };
        if let Some(part) = find_part("text/plain").or_else(|| find_part("text/html")) {
            if let Some(data) = part.get("body").and_then(|b| b.get("data")).and_then(|d| d.as_str())
            {
                let decoded = decode_body(data);
                if part.get("mimeType").and_then(|m| m.as_str()) == Some("text/html") {
                    return strip_html(&decoded);
                }
                return decoded;
            }
        }
    }

    String::new()
}

/// Gmail body data is base64url, sometimes padded.
fn decode_body(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

fn strip_html(html: &str) -> String {
    use std::sync::OnceLock;
    static TAGS: OnceLock<regex::Regex> = OnceLock::new();
    static SPACE: OnceLock<regex::Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| regex::Regex::new(r"<[^>]*>").expect("valid regex"));
    let space = SPACE.get_or_init(|| regex::Regex::new(r"\s+").expect("valid regex"));
    let no_tags = tags.replace_all(html, " ");
    space.replace_all(&no_tags, " ").trim().to_string()
}

/// Assemble the outbound message in RFC 2822 form and encode it the way the
/// Gmail send endpoint expects (base64url, no padding).
fn encode_rfc2822(req: &SendInput) -> String {
    let mut lines = vec![format!("To: {}", req.to)];
    if let Some(cc) = &req.cc {
        lines.push(format!("Cc: {cc}"));
    }
    if let Some(bcc) = &req.bcc {
        lines.push(format!("Bcc: {bcc}"));
    }
    lines.push(format!("Subject: {}", req.subject));
    lines.push("Content-Type: text/plain; charset=utf-8".into());
    lines.push(String::new());
    lines.push(req.body.clone());

    let email = lines.join("\r\n");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(email.as_bytes())
}
