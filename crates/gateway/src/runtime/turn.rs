//! Turn execution loop — the orchestrator state machine.
//!
//! One call to [`run_turn`] converts a user message (plus prior turns) into
//! a final assistant answer, looping through the completion service while it
//! requests tool use. Tool invocations within an iteration run concurrently
//! and are paired back to their invocation ids; completion calls across
//! iterations are strictly sequential.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::Instrument;

use adjutant_domain::error::Result;
use adjutant_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition, ToolOutcome};
use adjutant_domain::usage::Usage;
use adjutant_integrations::{render_for_model, ToolExecutor};
use adjutant_providers::{CompletionProvider, CompletionRequest};

/// Maximum number of tool-dispatch iterations per user message. The only
/// circuit breaker against a model stuck requesting the same tool forever:
/// when the bound is hit the turn ends with whatever text is available.
pub const MAX_TOOL_ITERATIONS: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A base64 image accompanying the user message.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

/// Input to a single turn. The orchestrator holds no session state — the
/// caller resolves the session and persists the exchange afterwards.
pub struct TurnInput {
    pub user_id: String,
    pub message: String,
    pub images: Vec<ImageAttachment>,
    /// Prior turns, oldest first.
    pub history: Vec<Message>,
    pub system_prompt: String,
    /// The tool set visible to this user for this turn.
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

/// The orchestration result.
#[derive(Debug)]
pub struct TurnOutcome {
    pub text: String,
    /// Token usage accumulated across every completion call in the loop.
    pub usage: Usage,
    /// Unique tool names invoked, in first-use order.
    pub tools_used: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn — the core loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one conversation turn.
///
/// Errors out only when the completion service itself fails; individual
/// tool failures are folded back into the loop as error-flagged results for
/// the model to react to.
pub async fn run_turn(
    provider: &dyn CompletionProvider,
    executor: &dyn ToolExecutor,
    mut input: TurnInput,
) -> Result<TurnOutcome> {
    let mut messages = std::mem::take(&mut input.history);
    messages.push(build_user_message(&input.message, &input.images));

    let mut total_usage = Usage::default();
    let mut tools_used: Vec<String> = Vec::new();

    let mut response = complete(provider, &messages, &input).await?;
    total_usage.add(&response.usage);

    let mut iterations = 0;
    while response.has_tool_calls() && iterations < MAX_TOOL_ITERATIONS {
        iterations += 1;
        tracing::debug!(iterations, calls = response.tool_calls.len(), "tool loop iteration");

        let calls = std::mem::take(&mut response.tool_calls);
        messages.push(Message::assistant_tool_use(&response.text, &calls));

        // Dispatch every invocation concurrently. Each future carries its
        // own call id so results are paired explicitly, not by position.
        let dispatch_futures: Vec<_> = calls
            .iter()
            .map(|call| {
                let span = tracing::info_span!("tool.call", tool_name = %call.tool_name);
                let executor = &executor;
                let user_id = input.user_id.as_str();
                async move {
                    let outcome = executor
                        .dispatch(user_id, &call.tool_name, &call.arguments)
                        .await;
                    (call.call_id.clone(), outcome)
                }
                .instrument(span)
            })
            .collect();
        let mut results: HashMap<String, ToolOutcome> =
            futures_util::future::join_all(dispatch_futures)
                .await
                .into_iter()
                .collect();

        let mut result_parts = Vec::with_capacity(calls.len());
        for call in &calls {
            if !tools_used.iter().any(|name| name == &call.tool_name) {
                tools_used.push(call.tool_name.clone());
            }
            let outcome = results
                .remove(&call.call_id)
                .unwrap_or_else(|| ToolOutcome::err("tool produced no result"));
            if !outcome.success {
                tracing::debug!(
                    tool_name = %call.tool_name,
                    error = outcome.error.as_deref().unwrap_or(""),
                    "tool invocation failed"
                );
            }
            result_parts.push((call.call_id.clone(), render_for_model(&outcome), !outcome.success));
        }
        messages.push(Message::tool_results(result_parts));

        response = complete(provider, &messages, &input).await?;
        total_usage.add(&response.usage);
    }

    if response.has_tool_calls() {
        // Bound reached while the model still wants tools: soft-fail with
        // whatever text is present rather than looping forever.
        tracing::warn!(
            iterations,
            "tool-use iteration bound reached; returning available text"
        );
    }

    Ok(TurnOutcome {
        text: response.text,
        usage: total_usage,
        tools_used,
    })
}

async fn complete(
    provider: &dyn CompletionProvider,
    messages: &[Message],
    input: &TurnInput,
) -> Result<adjutant_providers::CompletionResponse> {
    let req = CompletionRequest {
        messages: messages.to_vec(),
        system: input.system_prompt.clone(),
        tools: input.tools.clone(),
        max_tokens: input.max_tokens,
    };
    let span = tracing::info_span!("llm.call", provider = provider.provider_id());
    provider.complete(&req).instrument(span).await
}

fn build_user_message(text: &str, images: &[ImageAttachment]) -> Message {
    if images.is_empty() {
        return Message::user(text);
    }
    let mut parts = vec![ContentPart::Text { text: text.to_owned() }];
    for image in images {
        parts.push(ContentPart::Image {
            media_type: image.media_type.clone(),
            data: image.data.clone(),
        });
    }
    Message { role: Role::User, content: MessageContent::Parts(parts) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_with_images_becomes_parts() {
        let msg = build_user_message(
            "what's this?",
            &[ImageAttachment { media_type: "image/jpeg".into(), data: "Zm9v".into() }],
        );
        let MessageContent::Parts(parts) = &msg.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[1], ContentPart::Image { media_type, .. } if media_type == "image/jpeg"));
    }

    #[test]
    fn plain_user_message_stays_text() {
        let msg = build_user_message("hello", &[]);
        assert!(matches!(msg.content, MessageContent::Text(ref t) if t == "hello"));
    }
}
