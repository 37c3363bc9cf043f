//! Turn orchestrator integration tests
//!
//! Exercises the bounded model/tool loop end to end against a scripted
//! provider and the in-memory store: persistence protocol, iteration cap,
//! tool-result ordering, retry surfacing, and side-channel extraction.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use mentor_core::tools::BoxFuture;
use mentor_core::{
    ContentBlock, Error, MemoryStore, MessageRole, MessageStore, ModelProvider, ModelRequest,
    ModelResponse, OrchestratorConfig, SessionRegistry, SessionStore, StopReason, Tool,
    ToolError, ToolGateway, ToolRegistry, TranscriptMessage, TurnContext, TurnOrchestrator,
    TurnRequest,
};

/// Logging for test runs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mentor_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Provider that replays scripted responses and captures every request.
/// The last response repeats once the script is exhausted.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self, index: usize) -> ModelRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, request: ModelRequest) -> mentor_core::Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.pop_front().unwrap())
        } else {
            responses
                .front()
                .cloned()
                .ok_or_else(|| Error::Provider("script exhausted".to_string()))
        }
    }
}

fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::EndOfTurn,
        content: vec![ContentBlock::Text { text: text.to_string() }],
    }
}

fn tool_response(calls: &[(&str, &str, Value)]) -> ModelResponse {
    ModelResponse {
        stop_reason: StopReason::ToolRequest,
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect(),
    }
}

/// Counting stub tool returning `{"success":true}`
struct RecordMetric {
    calls: AtomicUsize,
}

impl RecordMetric {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0) })
    }
}

impl Tool for RecordMetric {
    fn name(&self) -> &str {
        "record_metric"
    }
    fn description(&self) -> &str {
        "Record a metric"
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }
    fn handle(&self, _input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(json!({"success": true})) })
    }
}

/// Always fails with a transient error
struct BrokenTool;

impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken_tool"
    }
    fn description(&self) -> &str {
        "Never succeeds"
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }
    fn handle(&self, _input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async { Err(ToolError::ExecutionFailed("backend unavailable".to_string())) })
    }
}

/// Declares side-channel fields in its result document
struct ContentStub;

impl Tool for ContentStub {
    fn name(&self) -> &str {
        "create_content"
    }
    fn description(&self) -> &str {
        "Creates content"
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }
    fn handle(&self, _input: Value) -> BoxFuture<'_, Result<Value, ToolError>> {
        Box::pin(async {
            Ok(json!({
                "success": true,
                "content_id": "content_abc",
                "action": {"type": "navigate_to_node", "node_id": "n-1"},
            }))
        })
    }
}

async fn new_session(store: &Arc<MemoryStore>) -> String {
    let sessions: Arc<dyn SessionStore> = store.clone();
    SessionRegistry::new(sessions)
        .find_or_create("user-1", "learning", Some("node-1"))
        .await
        .unwrap()
}

fn gateway_for(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolGateway> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Arc::new(ToolGateway::new(
        Arc::new(registry),
        &OrchestratorConfig::default(),
    ))
}

#[tokio::test]
async fn test_plain_completion_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![text_response("Variables store values.")]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store.clone());

    let result = orchestrator
        .orchestrate(TurnRequest::new(
            "user-1",
            session_id.clone(),
            "Explain variables",
            "You are a tutor.",
        ))
        .await?;

    assert_eq!(result.text, "Variables store values.");
    assert_eq!(result.session_id, session_id);
    assert!(result.side_channel.is_empty());
    assert_eq!(provider.call_count(), 1);

    // Exactly one user then one assistant message, in that order
    let messages = store.recent(&session_id, 10).await?;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "Explain variables");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "Variables store values.");
    Ok(())
}

#[tokio::test]
async fn test_single_tool_roundtrip() -> anyhow::Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![
        tool_response(&[("tc_1", "record_metric", json!({"value": 0.8}))]),
        text_response("Noted."),
    ]);
    let metric = RecordMetric::new();
    let gateway = gateway_for(vec![metric.clone() as Arc<dyn Tool>]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store.clone());

    let result = orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id, "Track this", "You are a tutor.")
                .with_tools(gateway.definitions(), gateway),
        )
        .await?;

    assert_eq!(result.text, "Noted.");
    assert_eq!(metric.calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.call_count(), 2);

    // Second model call saw the tool request echoed plus its result
    let followup = provider.request(1);
    let turns = followup.transcript.len();
    assert!(matches!(
        &followup.transcript[turns - 2],
        TranscriptMessage::AssistantBlocks { .. }
    ));
    match &followup.transcript[turns - 1] {
        TranscriptMessage::ToolResults { results } => {
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].tool_call_id, "tc_1");
            assert!(!results[0].is_error);
            assert_eq!(results[0].content, "{\"success\":true}");
        }
        other => panic!("expected tool results turn, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_iteration_cap_bounds_model_calls() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    // The script never ends the turn
    let provider = ScriptedProvider::new(vec![tool_response(&[(
        "tc_loop",
        "record_metric",
        json!({"value": 1.0}),
    )])]);
    let gateway = gateway_for(vec![RecordMetric::new() as Arc<dyn Tool>]);
    let config = OrchestratorConfig::default();
    let fallback = config.fallback_completion.clone();
    let orchestrator = TurnOrchestrator::new(config, provider.clone(), store.clone());

    let result = orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id.clone(), "Go", "You are a tutor.")
                .with_tools(gateway.definitions(), gateway),
        )
        .await
        .unwrap();

    // Never more than the cap, and still a non-empty completion
    assert_eq!(provider.call_count(), 5);
    assert_eq!(result.text, fallback);
    assert!(!result.text.is_empty());

    let messages = store.recent(&session_id, 10).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, fallback);
}

#[tokio::test]
async fn test_tool_results_match_request_order() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![
        tool_response(&[
            ("tc_a", "record_metric", json!({"value": 0.1})),
            ("tc_b", "record_metric", json!({"value": 0.2})),
            ("tc_c", "record_metric", json!({"value": 0.3})),
        ]),
        text_response("All recorded."),
    ]);
    let gateway = gateway_for(vec![RecordMetric::new() as Arc<dyn Tool>]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store);

    orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id, "Record all", "You are a tutor.")
                .with_tools(gateway.definitions(), gateway),
        )
        .await
        .unwrap();

    let followup = provider.request(1);
    let last = followup.transcript.last().unwrap();
    match last {
        TranscriptMessage::ToolResults { results } => {
            let ids: Vec<&str> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
            assert_eq!(ids, vec!["tc_a", "tc_b", "tc_c"]);
        }
        other => panic!("expected tool results turn, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_tool_surfaces_error_and_turn_survives() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![
        tool_response(&[("tc_1", "broken_tool", json!({}))]),
        text_response("That tool is unavailable right now."),
    ]);
    let gateway = gateway_for(vec![Arc::new(BrokenTool) as Arc<dyn Tool>]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store);

    let result = orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id, "Try it", "You are a tutor.")
                .with_tools(gateway.definitions(), gateway),
        )
        .await
        .unwrap();

    assert!(!result.text.is_empty());

    let followup = provider.request(1);
    match followup.transcript.last().unwrap() {
        TranscriptMessage::ToolResults { results } => {
            assert!(results[0].is_error);
            let doc: Value = serde_json::from_str(&results[0].content).unwrap();
            assert_eq!(doc["tool_name"], "broken_tool");
            assert!(doc["suggestion"].as_str().unwrap().contains("3 attempt"));
        }
        other => panic!("expected tool results turn, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tool_request_without_gateway_degrades() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let mut response = tool_response(&[("tc_1", "record_metric", json!({}))]);
    response
        .content
        .insert(0, ContentBlock::Text { text: "Let me record that.".to_string() });
    let provider = ScriptedProvider::new(vec![response]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store);

    let result = orchestrator
        .orchestrate(TurnRequest::new(
            "user-1",
            session_id,
            "Track this",
            "You are a tutor.",
        ))
        .await
        .unwrap();

    assert_eq!(result.text, "Let me record that.");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_length_limit_appends_truncation_marker() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![ModelResponse {
        stop_reason: StopReason::LengthLimit,
        content: vec![ContentBlock::Text { text: "A very long expl".to_string() }],
    }]);
    let orchestrator = TurnOrchestrator::new(OrchestratorConfig::default(), provider, store);

    let result = orchestrator
        .orchestrate(TurnRequest::new(
            "user-1",
            session_id,
            "Explain everything",
            "You are a tutor.",
        ))
        .await
        .unwrap();

    assert_eq!(
        result.text,
        "A very long expl\n\n[Response truncated due to length]"
    );
}

#[tokio::test]
async fn test_unknown_session_is_fatal_and_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let provider = ScriptedProvider::new(vec![text_response("unused")]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider, store.clone());

    let err = orchestrator
        .orchestrate(TurnRequest::new(
            "user-1",
            "missing-session",
            "hello",
            "You are a tutor.",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SessionNotFound(_)));
    assert_eq!(store.message_count("missing-session"), 0);
}

#[tokio::test]
async fn test_side_channel_carries_ids_and_actions() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![
        tool_response(&[("tc_1", "create_content", json!({"title": "Loops"}))]),
        text_response("Here is a note on loops."),
    ]);
    let gateway = gateway_for(vec![Arc::new(ContentStub) as Arc<dyn Tool>]);
    let orchestrator = TurnOrchestrator::new(OrchestratorConfig::default(), provider, store);

    let result = orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id, "Teach me loops", "You are a tutor.")
                .with_tools(gateway.definitions(), gateway),
        )
        .await
        .unwrap();

    assert_eq!(result.side_channel.content_id.as_deref(), Some("content_abc"));
    assert_eq!(result.side_channel.actions.len(), 1);
    assert_eq!(result.side_channel.actions[0]["type"], "navigate_to_node");
}

#[tokio::test]
async fn test_context_renders_after_instructions() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![text_response("ok")]);
    let orchestrator =
        TurnOrchestrator::new(OrchestratorConfig::default(), provider.clone(), store);

    let context = TurnContext {
        topic: Some("Docker Basics".to_string()),
        ..Default::default()
    };
    orchestrator
        .orchestrate(
            TurnRequest::new("user-1", session_id, "hi", "You are a tutor.")
                .with_context(context),
        )
        .await
        .unwrap();

    let request = provider.request(0);
    assert!(request.system.starts_with("You are a tutor."));
    let context_at = request.system.find("CURRENT CONTEXT:").unwrap();
    assert!(context_at > 0);
    assert!(request.system.contains("Topic: Docker Basics"));

    // The history read happened after the user write: the transcript ends
    // with this turn's user text.
    match request.transcript.last().unwrap() {
        TranscriptMessage::User { content } => assert_eq!(content, "hi"),
        other => panic!("expected user turn, got {other:?}"),
    }
}

#[tokio::test]
async fn test_history_window_is_bounded() {
    let store = Arc::new(MemoryStore::new());
    let session_id = new_session(&store).await;
    let provider = ScriptedProvider::new(vec![text_response("ok")]);
    let orchestrator = TurnOrchestrator::new(
        OrchestratorConfig {
            history_limit: 4,
            ..Default::default()
        },
        provider.clone(),
        store.clone(),
    );

    for i in 0..5 {
        orchestrator
            .orchestrate(TurnRequest::new(
                "user-1",
                session_id.clone(),
                format!("turn {i}"),
                "You are a tutor.",
            ))
            .await
            .unwrap();
    }

    // 10 messages persisted, but the last model call only saw 4
    assert_eq!(store.message_count(&session_id), 10);
    let last_request = provider.request(4);
    assert_eq!(last_request.transcript.len(), 4);
}
