//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use and the
//! Anthropic-specific message structure where system instructions go in a
//! separate top-level `system` field and tool results travel as user
//! messages carrying `tool_result` content blocks.

use adjutant_domain::config::CompletionConfig;
use adjutant_domain::error::{Error, Result};
use adjutant_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use adjutant_domain::usage::Usage;
use serde_json::Value;

use crate::traits::{CompletionProvider, CompletionRequest, CompletionResponse};
use crate::util::{from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A completion-service adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new provider from the deserialized completion config.
    ///
    /// Fails with [`Error::Completion`] when the API key env var is unset,
    /// so the gateway can report "AI service not configured" instead of a
    /// generic failure.
    pub fn from_config(cfg: &CompletionConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            client,
        })
    }

    fn build_messages_body(&self, req: &CompletionRequest) -> Value {
        let api_messages: Vec<Value> = req
            .messages
            .iter()
            .map(|msg| match msg.role {
                Role::User => user_msg_to_anthropic(msg),
                Role::Assistant => assistant_msg_to_anthropic(msg),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": req.max_tokens,
        });

        if !req.system.is_empty() {
            body["system"] = Value::String(req.system.clone());
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

#[async_trait::async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req);

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let raw = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Completion(format!(
                "messages request returned HTTP {}: {}",
                status.as_u16(),
                truncate(&raw, 500)
            )));
        }

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| Error::Completion(format!("unparseable messages response: {e}")))?;

        parse_anthropic_response(&parsed)
    }

    fn provider_id(&self) -> &str {
        "anthropic"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn user_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "user",
            "content": t,
        }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ToolResult { tool_use_id, content, is_error } => {
                        Some(serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": tool_use_id,
                            "content": content,
                            "is_error": is_error,
                        }))
                    }
                    ContentPart::Image { media_type, data } => Some(serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": media_type,
                            "data": data,
                        }
                    })),
                    _ => None,
                })
                .collect();
            serde_json::json!({
                "role": "user",
                "content": content,
            })
        }
    }
}

fn assistant_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "assistant",
            "content": [{"type": "text", "text": t}],
        }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    })),
                    _ => None,
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": content,
            })
        }
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<CompletionResponse> {
    let empty = Vec::new();
    let content_arr = body
        .get("content")
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content_arr {
        let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match block_type {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t.to_string());
                }
            }
            "tool_use" => {
                let call_id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let tool_name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let arguments = block
                    .get("input")
                    .cloned()
                    .unwrap_or(Value::Object(Default::default()));
                tool_calls.push(ToolCall { call_id, tool_name, arguments });
            }
            _ => {}
        }
    }

    let stop_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let usage = body
        .get("usage")
        .and_then(parse_anthropic_usage)
        .unwrap_or_default();

    Ok(CompletionResponse {
        text: text_parts.join("\n"),
        tool_calls,
        usage,
        stop_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage { input_tokens: input, output_tokens: output })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider {
            base_url: "https://api.anthropic.com".into(),
            api_key: "sk-test".into(),
            model: "claude-sonnet-4-20250514".into(),
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn system_goes_in_top_level_field() {
        let req = CompletionRequest {
            messages: vec![Message::user("hi")],
            system: "You are a helpful assistant.".into(),
            tools: Vec::new(),
            max_tokens: 4096,
        };
        let body = provider().build_messages_body(&req);
        assert_eq!(body["system"], "You are a helpful assistant.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        // No tools key when none are offered.
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tools_serialize_with_input_schema() {
        let req = CompletionRequest {
            messages: vec![Message::user("list my tasks")],
            system: String::new(),
            tools: vec![ToolDefinition {
                name: "list_asana_tasks".into(),
                description: "List tasks".into(),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
            }],
            max_tokens: 1024,
        };
        let body = provider().build_messages_body(&req);
        assert_eq!(body["tools"][0]["name"], "list_asana_tasks");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn tool_results_travel_as_user_content_blocks() {
        let msg = Message::tool_results(vec![
            ("call_1".into(), "{\"ok\":true}".into(), false),
            ("call_2".into(), "Error: not found".into(), true),
        ]);
        let v = user_msg_to_anthropic(&msg);
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"][0]["type"], "tool_result");
        assert_eq!(v["content"][0]["tool_use_id"], "call_1");
        assert_eq!(v["content"][1]["is_error"], true);
    }

    #[test]
    fn image_attachments_become_base64_source_blocks() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "what's in this?".into() },
                ContentPart::Image { media_type: "image/png".into(), data: "aGVsbG8=".into() },
            ]),
        };
        let v = user_msg_to_anthropic(&msg);
        assert_eq!(v["content"][1]["type"], "image");
        assert_eq!(v["content"][1]["source"]["media_type"], "image/png");
        assert_eq!(v["content"][1]["source"]["data"], "aGVsbG8=");
    }

    #[test]
    fn response_parsing_extracts_text_and_tool_calls() {
        let body = serde_json::json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_01", "name": "list_calendar_events",
                 "input": {"maxResults": 5}},
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 120, "output_tokens": 45},
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert_eq!(resp.text, "Let me check.");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].call_id, "toolu_01");
        assert_eq!(resp.tool_calls[0].arguments["maxResults"], 5);
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(resp.usage.input_tokens, 120);
        assert_eq!(resp.usage.output_tokens, 45);
    }

    #[test]
    fn response_without_tool_calls_is_final() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "All done."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 3},
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.text, "All done.");
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "ok"}],
        });
        let resp = parse_anthropic_response(&body).unwrap();
        assert_eq!(resp.usage, Usage::default());
    }
}
