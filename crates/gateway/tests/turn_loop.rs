//! Orchestrator loop behavior, exercised with scripted completion and tool
//! doubles: termination, the iteration bound, result pairing, failure
//! absorption, and usage accounting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use adjutant_domain::error::{Error, Result};
use adjutant_domain::tool::{ContentPart, MessageContent, Role, ToolCall, ToolOutcome};
use adjutant_domain::usage::Usage;
use adjutant_gateway::runtime::{run_turn, TurnInput, MAX_TOOL_ITERATIONS};
use adjutant_integrations::ToolExecutor;
use adjutant_providers::{CompletionProvider, CompletionRequest, CompletionResponse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Doubles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        text: text.into(),
        tool_calls: Vec::new(),
        usage: Usage { input_tokens: 100, output_tokens: 25 },
        stop_reason: Some("end_turn".into()),
    }
}

fn tool_response(text: &str, calls: Vec<(&str, &str, Value)>) -> CompletionResponse {
    CompletionResponse {
        text: text.into(),
        tool_calls: calls
            .into_iter()
            .map(|(id, name, arguments)| ToolCall {
                call_id: id.into(),
                tool_name: name.into(),
                arguments,
            })
            .collect(),
        usage: Usage { input_tokens: 100, output_tokens: 25 },
        stop_reason: Some("tool_use".into()),
    }
}

/// Plays back a fixed script of responses and records every request.
struct ScriptedProvider {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(req.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Completion("script exhausted".into()))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Requests tool use on every single completion, forever.
struct RelentlessToolProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CompletionProvider for RelentlessToolProvider {
    async fn complete(&self, _req: &CompletionRequest) -> Result<CompletionResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            text: "still working".into(),
            tool_calls: vec![ToolCall {
                call_id: format!("call_{n}"),
                tool_name: "list_asana_tasks".into(),
                arguments: json!({}),
            }],
            usage: Usage { input_tokens: 100, output_tokens: 25 },
            stop_reason: Some("tool_use".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "relentless"
    }
}

/// Always fails, as if the completion service is unreachable.
struct DownProvider;

#[async_trait::async_trait]
impl CompletionProvider for DownProvider {
    async fn complete(&self, _req: &CompletionRequest) -> Result<CompletionResponse> {
        Err(Error::Completion("connection refused".into()))
    }

    fn provider_id(&self) -> &str {
        "down"
    }
}

/// Records dispatches and returns per-tool canned outcomes, with optional
/// per-call delays to exercise completion-order independence.
struct RecordingExecutor {
    dispatches: Mutex<Vec<(String, Value)>>,
    outcomes: Mutex<std::collections::HashMap<String, ToolOutcome>>,
    delays_ms: Mutex<std::collections::HashMap<String, u64>>,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self {
            dispatches: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Default::default()),
            delays_ms: Mutex::new(Default::default()),
        }
    }

    fn on(&self, tool: &str, outcome: ToolOutcome) {
        self.outcomes.lock().unwrap().insert(tool.into(), outcome);
    }

    fn delay(&self, tool: &str, ms: u64) {
        self.delays_ms.lock().unwrap().insert(tool.into(), ms);
    }

    fn dispatched(&self) -> Vec<(String, Value)> {
        self.dispatches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn dispatch(&self, _user_id: &str, tool_name: &str, input: &Value) -> ToolOutcome {
        self.dispatches
            .lock()
            .unwrap()
            .push((tool_name.to_owned(), input.clone()));
        let delay = self.delays_ms.lock().unwrap().get(tool_name).copied();
        if let Some(ms) = delay {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(tool_name)
            .cloned()
            .unwrap_or_else(|| ToolOutcome::ok(json!({ "ok": true })))
    }
}

fn input(message: &str) -> TurnInput {
    TurnInput {
        user_id: "user-1".into(),
        message: message.into(),
        images: Vec::new(),
        history: Vec::new(),
        system_prompt: "You are a test assistant.".into(),
        tools: Vec::new(),
        max_tokens: 4096,
    }
}

/// The tool_result parts of the last recorded request's final message.
fn last_tool_results(provider: &ScriptedProvider) -> Vec<(String, String, bool)> {
    let requests = provider.recorded_requests();
    let last = requests.last().expect("at least one request");
    let msg = last.messages.last().expect("at least one message");
    assert_eq!(msg.role, Role::User);
    let MessageContent::Parts(parts) = &msg.content else {
        panic!("expected tool results as parts");
    };
    parts
        .iter()
        .map(|p| match p {
            ContentPart::ToolResult { tool_use_id, content, is_error } => {
                (tool_use_id.clone(), content.clone(), *is_error)
            }
            other => panic!("unexpected part: {other:?}"),
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn plain_answer_never_touches_tools() {
    let provider = ScriptedProvider::new(vec![text_response("Hi! How can I help?")]);
    let executor = RecordingExecutor::new();

    let outcome = run_turn(&provider, &executor, input("hello")).await.unwrap();

    assert_eq!(outcome.text, "Hi! How can I help?");
    assert!(outcome.tools_used.is_empty());
    assert!(executor.dispatched().is_empty());
    assert_eq!(outcome.usage, Usage { input_tokens: 100, output_tokens: 25 });
}

#[tokio::test]
async fn tool_request_dispatches_then_completes_again() {
    // The Asana scenario: the model asks for create_asana_task once, the
    // result is folded back, and a second completion produces the answer.
    let provider = ScriptedProvider::new(vec![
        tool_response(
            "Creating that task.",
            vec![("toolu_1", "create_asana_task", json!({ "name": "Review contract" }))],
        ),
        text_response("Done — \"Review contract\" is on your list."),
    ]);
    let executor = RecordingExecutor::new();
    executor.on(
        "create_asana_task",
        ToolOutcome::ok(json!({ "id": "1201", "name": "Review contract" })),
    );

    let outcome = run_turn(&provider, &executor, input("add a task to review the contract"))
        .await
        .unwrap();

    // Exactly one dispatch, with the model's structured input.
    let dispatched = executor.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].0, "create_asana_task");
    assert_eq!(dispatched[0].1, json!({ "name": "Review contract" }));

    // Two completion calls; the second carries the tool result paired to
    // the originating invocation id.
    let results = last_tool_results(&provider);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "toolu_1");
    assert!(results[0].1.contains("Review contract"));
    assert!(!results[0].2);

    assert_eq!(outcome.text, "Done — \"Review contract\" is on your list.");
    assert_eq!(outcome.tools_used, vec!["create_asana_task"]);
    // Usage accumulated across both completion calls.
    assert_eq!(outcome.usage, Usage { input_tokens: 200, output_tokens: 50 });
}

#[tokio::test]
async fn results_pair_by_invocation_id_not_completion_order() {
    let provider = ScriptedProvider::new(vec![
        tool_response(
            "Checking both.",
            vec![
                ("call_slow", "list_calendar_events", json!({})),
                ("call_fast", "list_asana_tasks", json!({})),
            ],
        ),
        text_response("Here's your day."),
    ]);
    let executor = RecordingExecutor::new();
    // The first-issued invocation finishes last.
    executor.delay("list_calendar_events", 80);
    executor.on("list_calendar_events", ToolOutcome::ok(json!({ "events": ["standup"] })));
    executor.on("list_asana_tasks", ToolOutcome::ok(json!({ "tasks": ["review"] })));

    run_turn(&provider, &executor, input("what's my day look like?"))
        .await
        .unwrap();

    let results = last_tool_results(&provider);
    assert_eq!(results.len(), 2);
    let slow = results.iter().find(|(id, _, _)| id == "call_slow").unwrap();
    let fast = results.iter().find(|(id, _, _)| id == "call_fast").unwrap();
    assert!(slow.1.contains("standup"), "calendar result must follow its id");
    assert!(fast.1.contains("review"), "task result must follow its id");
}

#[tokio::test]
async fn failing_tool_feeds_error_back_without_aborting() {
    let provider = ScriptedProvider::new(vec![
        tool_response("Let me look.", vec![("toolu_1", "get_asana_task", json!({ "taskId": "9" }))]),
        text_response("I couldn't find that task — it may have been deleted."),
    ]);
    let executor = RecordingExecutor::new();
    executor.on("get_asana_task", ToolOutcome::err("Task not found"));

    let outcome = run_turn(&provider, &executor, input("show task 9")).await.unwrap();

    let results = last_tool_results(&provider);
    assert_eq!(results[0].1, "Error: Task not found");
    assert!(results[0].2, "failed invocation must be error-flagged");
    // The turn still completed normally.
    assert!(outcome.text.contains("couldn't find"));
}

#[tokio::test]
async fn iteration_bound_stops_a_relentless_tool_user() {
    let provider = RelentlessToolProvider { calls: AtomicUsize::new(0) };
    let executor = RecordingExecutor::new();

    let outcome = run_turn(&provider, &executor, input("loop forever")).await.unwrap();

    // 1 initial completion + one per dispatch round.
    assert_eq!(provider.calls.load(Ordering::SeqCst), MAX_TOOL_ITERATIONS + 1);
    assert_eq!(executor.dispatched().len(), MAX_TOOL_ITERATIONS);
    // Soft-fail: whatever text the last response carried, not an error.
    assert_eq!(outcome.text, "still working");
    assert_eq!(outcome.tools_used, vec!["list_asana_tasks"]);
}

#[tokio::test]
async fn completion_failure_is_fatal_to_the_turn() {
    let executor = RecordingExecutor::new();

    let err = run_turn(&DownProvider, &executor, input("hello")).await.unwrap_err();

    assert!(matches!(err, Error::Completion(_)));
    assert!(executor.dispatched().is_empty());
}

#[tokio::test]
async fn mid_loop_completion_failure_propagates() {
    // First call requests a tool, second call fails: the turn errors out
    // even though a tool already ran.
    let provider = ScriptedProvider::new(vec![tool_response(
        "checking",
        vec![("toolu_1", "list_asana_tasks", json!({}))],
    )]);
    let executor = RecordingExecutor::new();

    let err = run_turn(&provider, &executor, input("tasks?")).await.unwrap_err();

    assert!(matches!(err, Error::Completion(_)));
    assert_eq!(executor.dispatched().len(), 1);
}
