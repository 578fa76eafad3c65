use serde::{Deserialize, Serialize};

/// A model-issued request to invoke a named tool with structured input.
/// Parsed out of a completion response; the `call_id` pairs the eventual
/// result back to this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

/// The uniform result shape every tool dispatch produces. Dispatch never
/// fails across this boundary — provider errors are folded into
/// `success == false` with a human-readable message the model can act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }

    /// Render the outcome as the textual payload fed back to the model.
    pub fn render(&self) -> String {
        if self.success {
            match &self.data {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
                None => String::new(),
            }
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

/// A message in the conversation (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(rename = "image")]
    Image {
        media_type: String,
        /// Base64-encoded image bytes.
        data: String,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    /// Assistant message carrying the text (if any) plus the tool-use blocks
    /// from a completion response, in response order.
    pub fn assistant_tool_use(text: &str, calls: &[ToolCall]) -> Self {
        let mut parts = Vec::new();
        if !text.is_empty() {
            parts.push(ContentPart::Text { text: text.to_owned() });
        }
        for call in calls {
            parts.push(ContentPart::ToolUse {
                id: call.call_id.clone(),
                name: call.tool_name.clone(),
                input: call.arguments.clone(),
            });
        }
        Self { role: Role::Assistant, content: MessageContent::Parts(parts) }
    }

    /// User message carrying one tool_result part per dispatched call,
    /// each tagged with the originating call id.
    pub fn tool_results(results: Vec<(String, String, bool)>) -> Self {
        let parts = results
            .into_iter()
            .map(|(tool_use_id, content, is_error)| ContentPart::ToolResult {
                tool_use_id,
                content,
                is_error,
            })
            .collect();
        Self { role: Role::User, content: MessageContent::Parts(parts) }
    }
}

impl MessageContent {
    /// Concatenated text of every text part.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_tool_use_preserves_call_order() {
        let calls = vec![
            ToolCall {
                call_id: "a".into(),
                tool_name: "first".into(),
                arguments: serde_json::json!({}),
            },
            ToolCall {
                call_id: "b".into(),
                tool_name: "second".into(),
                arguments: serde_json::json!({}),
            },
        ];
        let msg = Message::assistant_tool_use("thinking", &calls);
        let MessageContent::Parts(parts) = &msg.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], ContentPart::Text { text } if text == "thinking"));
        assert!(matches!(&parts[1], ContentPart::ToolUse { id, .. } if id == "a"));
        assert!(matches!(&parts[2], ContentPart::ToolUse { id, .. } if id == "b"));
    }

    #[test]
    fn outcome_render_success_pretty_prints_json() {
        let outcome = ToolOutcome::ok(serde_json::json!({ "id": "123" }));
        let rendered = outcome.render();
        assert!(rendered.contains("\"id\""));
        assert!(rendered.contains("123"));
    }

    #[test]
    fn outcome_render_string_data_is_verbatim() {
        let outcome = ToolOutcome::ok(serde_json::Value::String("# Meeting".into()));
        assert_eq!(outcome.render(), "# Meeting");
    }

    #[test]
    fn outcome_render_error_is_prefixed() {
        let outcome = ToolOutcome::err("Task not found");
        assert_eq!(outcome.render(), "Error: Task not found");
    }

    #[test]
    fn content_text_skips_tool_parts() {
        let msg = Message::assistant_tool_use(
            "partial answer",
            &[ToolCall {
                call_id: "x".into(),
                tool_name: "t".into(),
                arguments: serde_json::json!({}),
            }],
        );
        assert_eq!(msg.content.text(), "partial answer");
    }
}
