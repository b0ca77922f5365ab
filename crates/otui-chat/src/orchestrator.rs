//! `ChatOrchestrator`: one chat turn driven as an explicit state machine
//! (`Idle -> Streaming -> [DetectedToolCalls -> PermissionWait ->
//! ExecutingTools -> Streaming]* -> Done|Error`), resumable across a
//! `PermissionWait` suspension because the permission prompt is a real
//! channel wait (`resolve_permission` can be called from any other task)
//! rather than a blocking callback.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use futures::StreamExt;
use otui_common::types::{IterationStep, Message, Role, ToolCall, split_tool_name};
use otui_mcp::{McpManager, PolicyContext};
use otui_providers::{ProviderAdapter, StreamEvent, ToolSchema};
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    history::{IterationHistory, now},
    state::{ChatEvent, OrchestratorState, PermissionDecision},
};

const DEFAULT_MAX_ITERATIONS: u32 = 10;
const DENIED_RESULT: &str = "Tool execution denied by user";

/// What a completed (or iteration-capped) turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub history: Vec<IterationStep>,
    pub max_reached: bool,
}

pub struct ChatOrchestrator {
    mcp: Arc<McpManager>,
    max_iterations: u32,
    pending: Mutex<HashMap<String, oneshot::Sender<PermissionDecision>>>,
}

impl ChatOrchestrator {
    pub fn new(mcp: Arc<McpManager>) -> Self {
        Self::with_max_iterations(mcp, DEFAULT_MAX_ITERATIONS)
    }

    pub fn with_max_iterations(mcp: Arc<McpManager>, max_iterations: u32) -> Self {
        Self { mcp, max_iterations, pending: Mutex::new(HashMap::new()) }
    }

    /// Resolve a previously emitted `ToolPermissionRequest`. This is the
    /// resumption entry point: it may be called from a completely
    /// different task while `send`'s future sits parked in
    /// `PermissionWait`.
    pub async fn resolve_permission(&self, request_id: &str, decision: PermissionDecision) -> Result<()> {
        let sender =
            self.pending.lock().await.remove(request_id).ok_or_else(|| Error::UnknownPermissionRequest(request_id.to_string()))?;
        let _ = sender.send(decision);
        Ok(())
    }

    /// Run one full turn: append `user_msg`, stream the provider's
    /// response, mediate and execute any tool calls it asks for, and loop
    /// until the provider stops asking or `max_iterations` is hit.
    pub async fn send(
        &self,
        provider: &dyn ProviderAdapter,
        policy: &PolicyContext<'_>,
        messages: &mut Vec<Message>,
        user_msg: impl Into<String>,
        always_allow: &mut HashSet<String>,
        cancel: &CancellationToken,
        on_event: &(dyn Fn(ChatEvent) + Send + Sync),
    ) -> Result<TurnOutcome> {
        messages.push(Message::new(Role::User, user_msg.into(), now()));

        let mut history = IterationHistory::default();
        let mut iteration: u32 = 0;
        let mut tools_enabled = true;
        let mut last_text = String::new();

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                history.mark_max_reached();
                warn!(iteration, "chat orchestrator reached max iterations");
                break;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            on_event(ChatEvent::StateChanged(OrchestratorState::Streaming));

            let tool_defs = self.mcp.tools(policy).await;
            let schemas: Vec<ToolSchema> = tool_defs
                .iter()
                .map(|t| ToolSchema {
                    name: t.name.clone(),
                    description: t.description.clone().unwrap_or_default(),
                    input_schema: t.input_schema.clone(),
                })
                .collect();
            let offer_tools = tools_enabled && !schemas.is_empty();

            let start = now();
            let stream_result = provider.chat_stream(messages.as_slice(), offer_tools.then_some(schemas.as_slice())).await;
            let mut stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    history.push(step_record(iteration, "stream", start, false, None, None, Some(e.to_string())));
                    on_event(ChatEvent::StateChanged(OrchestratorState::Error));
                    return Err(e.into());
                },
            };

            let (text, tool_calls, stream_error) = self.drain_stream(&mut stream, cancel, on_event).await;

            if let Some(e) = stream_error {
                history.push(step_record(iteration, "stream", start, false, None, None, Some(e.to_string())));
                on_event(ChatEvent::StateChanged(OrchestratorState::Error));
                return Err(e.into());
            }

            info!(iteration, text_len = text.len(), tool_calls = tool_calls.len(), "orchestrator stream finished");
            history.push(step_record(iteration, "stream", start, true, None, None, None));
            last_text = text;

            if tool_calls.is_empty() {
                on_event(ChatEvent::StateChanged(OrchestratorState::Done));
                return Ok(TurnOutcome { text: last_text, history: history.into_steps(), max_reached: false });
            }

            on_event(ChatEvent::StateChanged(OrchestratorState::DetectedToolCalls));

            if !last_text.is_empty() {
                messages.push(Message::new(Role::Assistant, last_text.clone(), now()));
            }

            for call in &tool_calls {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let short_name = split_tool_name(&call.name).map(|(s, _)| s.to_string());
                let step_start = now();
                let content = self.run_one_tool(call, policy, always_allow, cancel, on_event).await?;
                let ok = content.get("error").is_none();
                let error_msg = content.get("error").and_then(|v| v.as_str()).map(str::to_string);
                messages.push(Message::new(Role::Tool, content.to_string(), now()));
                history.push(step_record(iteration, "tool", step_start, ok, Some(call.name.clone()), short_name, error_msg));
            }

            // The round right after executing tools always goes out
            // without tools, so a provider can't immediately re-trigger
            // its own tool calls. If that toolless probe still surfaces
            // an intent (via the leak parser — no native tool schema was
            // even offered) tools come back on for the next round.
            tools_enabled = !tools_enabled;
        }

        on_event(ChatEvent::StateChanged(OrchestratorState::Done));
        Ok(TurnOutcome { text: last_text, history: history.into_steps(), max_reached: true })
    }

    async fn drain_stream(
        &self,
        stream: &mut otui_providers::ChatStream<'_>,
        cancel: &CancellationToken,
        on_event: &(dyn Fn(ChatEvent) + Send + Sync),
    ) -> (String, Vec<ToolCall>, Option<otui_providers::Error>) {
        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                item = stream.next() => item,
            };
            let Some(event) = next else { break };
            match event {
                Ok(StreamEvent::TextDelta(delta)) => {
                    text.push_str(&delta);
                    on_event(ChatEvent::TextDelta(delta));
                },
                Ok(StreamEvent::ToolCalls(calls)) => {
                    // Only the first appearance of tool calls in a turn is
                    // honored — later ones in the same stream are ignored to
                    // prevent duplicate dispatch.
                    if tool_calls.is_empty() {
                        tool_calls = calls;
                    }
                },
                Ok(StreamEvent::Done) => break,
                Err(e) => return (text, tool_calls, Some(e)),
            }
        }
        (text, tool_calls, None)
    }

    /// Mediate permission for one tool call (skipping the prompt if it's
    /// already in the session's always-allow set) and, if approved,
    /// execute it. Returns `{"result": ...}` or `{"error": ...}` — never
    /// an `Err` except on internal channel failure, so a denial or a
    /// failed call both become an ordinary tool-result message.
    async fn run_one_tool(
        &self,
        call: &ToolCall,
        policy: &PolicyContext<'_>,
        always_allow: &mut HashSet<String>,
        cancel: &CancellationToken,
        on_event: &(dyn Fn(ChatEvent) + Send + Sync),
    ) -> Result<serde_json::Value> {
        if !always_allow.contains(&call.name) {
            let request_id = Uuid::new_v4().to_string();
            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(request_id.clone(), tx);

            on_event(ChatEvent::StateChanged(OrchestratorState::PermissionWait));
            on_event(ChatEvent::ToolPermissionRequest {
                request_id: request_id.clone(),
                tool_name: call.name.clone(),
                purpose: format!("execute tool '{}'", call.name),
                call: call.clone(),
            });

            let decision = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.pending.lock().await.remove(&request_id);
                    return Err(Error::Cancelled);
                },
                decision = rx => decision.map_err(|_| Error::Message("permission sender dropped".into()))?,
            };

            if decision.always_allow {
                always_allow.insert(call.name.clone());
            }
            if !decision.approved {
                return Ok(serde_json::json!({ "result": DENIED_RESULT }));
            }
        }

        on_event(ChatEvent::StateChanged(OrchestratorState::ExecutingTools));
        on_event(ChatEvent::ToolCallStart { id: call.id.clone(), name: call.name.clone(), arguments: call.arguments.clone() });

        match self.mcp.execute_tool(&call.name, call.arguments.clone(), policy).await {
            Ok(val) => {
                on_event(ChatEvent::ToolCallEnd { id: call.id.clone(), name: call.name.clone(), success: true, error: None, result: Some(val.clone()) });
                Ok(serde_json::json!({ "result": val }))
            },
            Err(e) => {
                let err_str = e.to_string();
                on_event(ChatEvent::ToolCallEnd { id: call.id.clone(), name: call.name.clone(), success: false, error: Some(err_str.clone()), result: None });
                Ok(serde_json::json!({ "error": err_str }))
            },
        }
    }
}

fn step_record(n: u32, purpose: &str, start: i64, ok: bool, tool_name: Option<String>, short_name: Option<String>, error_msg: Option<String>) -> IterationStep {
    IterationStep { n, purpose: purpose.to_string(), start, end: now(), ok, tool_name, short_name, error_msg }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use otui_providers::ModelInfo;

    use super::*;

    /// Replays one `StreamEvent` sequence per call, in order; repeats the
    /// last sequence once it runs out.
    struct ScriptedProvider {
        turns: Vec<Vec<StreamEvent>>,
        call_count: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
            Self { turns, call_count: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        async fn chat_stream<'a>(&'a self, _messages: &'a [Message], _tools: Option<&'a [ToolSchema]>) -> otui_providers::error::Result<otui_providers::ChatStream<'a>> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            let script = self.turns.get(idx).or_else(|| self.turns.last()).cloned().unwrap_or_default();
            Ok(Box::pin(futures::stream::iter(script.into_iter().map(Ok))))
        }

        async fn list_models(&self) -> otui_providers::error::Result<Vec<ModelInfo>> {
            Ok(vec![])
        }

        async fn ping(&self) -> otui_providers::error::Result<()> {
            Ok(())
        }

        fn get_model(&self) -> &str {
            "scripted"
        }

        fn get_display_name(&self) -> &str {
            "Scripted"
        }

        fn set_model(&mut self, _model: String) {}
    }

    fn no_op_event() -> impl Fn(ChatEvent) + Send + Sync {
        |_event| {}
    }

    #[tokio::test]
    async fn plain_text_turn_completes_without_tool_calls() {
        let provider = ScriptedProvider::new(vec![vec![StreamEvent::TextDelta("hi there".into()), StreamEvent::Done]]);
        let mcp = Arc::new(McpManager::new());
        let orchestrator = ChatOrchestrator::new(mcp);
        let enabled = HashSet::new();
        let policy = PolicyContext { global_plugins_enabled: true, plugin_manager_enabled: true, session_enabled_plugins: &enabled };
        let mut messages = Vec::new();
        let mut always_allow = HashSet::new();
        let cancel = CancellationToken::new();

        let outcome = orchestrator.send(&provider, &policy, &mut messages, "hello", &mut always_allow, &cancel, &no_op_event()).await.unwrap();

        assert_eq!(outcome.text, "hi there");
        assert!(!outcome.max_reached);
        assert_eq!(outcome.history.len(), 1);
        assert!(outcome.history[0].ok);
    }

    #[tokio::test]
    async fn unapproved_tool_call_records_failed_step_then_completes() {
        // No plugin is registered, so `execute_tool` resolves to NotFound —
        // this exercises the always-allow bypass plus the error-result path
        // without needing a full MCP fixture.
        let call = ToolCall { id: "call-1".into(), name: "fs.read".into(), arguments: serde_json::json!({}) };
        let provider = ScriptedProvider::new(vec![
            vec![StreamEvent::ToolCalls(vec![call.clone()]), StreamEvent::Done],
            vec![StreamEvent::TextDelta("done".into()), StreamEvent::Done],
        ]);
        let mcp = Arc::new(McpManager::new());
        let orchestrator = ChatOrchestrator::new(mcp);
        let enabled = HashSet::new();
        let policy = PolicyContext { global_plugins_enabled: true, plugin_manager_enabled: true, session_enabled_plugins: &enabled };
        let mut messages = Vec::new();
        let mut always_allow = HashSet::from(["fs.read".to_string()]);
        let cancel = CancellationToken::new();

        let outcome = orchestrator.send(&provider, &policy, &mut messages, "hello", &mut always_allow, &cancel, &no_op_event()).await.unwrap();

        assert_eq!(outcome.text, "done");
        assert!(!outcome.max_reached);
        let tool_step = outcome.history.iter().find(|s| s.purpose == "tool").unwrap();
        assert!(!tool_step.ok);
        assert_eq!(tool_step.tool_name.as_deref(), Some("fs.read"));
    }

    #[tokio::test]
    async fn adversarial_provider_is_capped_at_max_iterations() {
        let call = ToolCall { id: "call-1".into(), name: "fs.read".into(), arguments: serde_json::json!({}) };
        let turn = vec![StreamEvent::ToolCalls(vec![call]), StreamEvent::Done];
        let provider = ScriptedProvider::new(vec![turn]);
        let mcp = Arc::new(McpManager::new());
        let orchestrator = ChatOrchestrator::with_max_iterations(mcp, 3);
        let enabled = HashSet::new();
        let policy = PolicyContext { global_plugins_enabled: true, plugin_manager_enabled: true, session_enabled_plugins: &enabled };
        let mut messages = Vec::new();
        let mut always_allow = HashSet::from(["fs.read".to_string()]);
        let cancel = CancellationToken::new();

        let outcome = orchestrator.send(&provider, &policy, &mut messages, "hello", &mut always_allow, &cancel, &no_op_event()).await.unwrap();

        assert!(outcome.max_reached);
        assert_eq!(outcome.history.iter().filter(|s| s.purpose == "stream").count(), 3);
    }

    #[tokio::test]
    async fn permission_request_is_resumed_from_another_task() {
        let call = ToolCall { id: "call-1".into(), name: "fs.read".into(), arguments: serde_json::json!({}) };
        let provider = ScriptedProvider::new(vec![
            vec![StreamEvent::ToolCalls(vec![call]), StreamEvent::Done],
            vec![StreamEvent::TextDelta("ack".into()), StreamEvent::Done],
        ]);
        let mcp = Arc::new(McpManager::new());
        let orchestrator = Arc::new(ChatOrchestrator::new(mcp));
        let enabled = HashSet::new();
        let policy = PolicyContext { global_plugins_enabled: true, plugin_manager_enabled: true, session_enabled_plugins: &enabled };
        let mut messages = Vec::new();
        let mut always_allow = HashSet::new();
        let cancel = CancellationToken::new();

        let (request_tx, mut request_rx) = tokio::sync::mpsc::unbounded_channel();
        let on_event = move |event: ChatEvent| {
            if let ChatEvent::ToolPermissionRequest { request_id, .. } = event {
                let _ = request_tx.send(request_id);
            }
        };

        let resolver = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let id = request_rx.recv().await.expect("permission request channel closed");
                orchestrator.resolve_permission(&id, PermissionDecision { approved: false, always_allow: false }).await.unwrap();
            })
        };

        let outcome = orchestrator.send(&provider, &policy, &mut messages, "hello", &mut always_allow, &cancel, &on_event).await.unwrap();
        resolver.await.unwrap();

        assert_eq!(outcome.text, "ack");
        assert!(messages.iter().any(|m| m.content.contains("Tool execution denied by user")));
    }
}
