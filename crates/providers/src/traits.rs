use adjutant_domain::error::Result;
use adjutant_domain::tool::{Message, ToolCall, ToolDefinition};
use adjutant_domain::usage::Usage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// The conversation messages to send (user/assistant turns only —
    /// system instructions travel separately).
    pub messages: Vec<Message>,
    /// System instructions for this turn.
    pub system: String,
    /// Tool definitions the model may invoke. Empty = no tools offered.
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
}

/// A provider-agnostic completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenated text content of the response.
    pub text: String,
    /// Tool invocations requested by the model, in response order.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this single completion call.
    pub usage: Usage,
    /// Why the model stopped (e.g. "end_turn", "tool_use").
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait the completion-service adapter implements.
///
/// Any failure returned from [`complete`](CompletionProvider::complete) is a
/// completion-service failure and is fatal to the turn that issued it —
/// callers must not retry inside the tool loop.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one completion request and wait for the full response.
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
