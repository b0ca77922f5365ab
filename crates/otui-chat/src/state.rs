//! The turn state machine: `Idle -> Streaming -> [DetectedToolCalls ->
//! PermissionWait -> ExecutingTools -> Streaming]* -> Done|Error`.

use otui_common::types::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Streaming,
    DetectedToolCalls,
    PermissionWait,
    ExecutingTools,
    Done,
    Error,
}

/// A caller's response to a `ToolPermissionRequest`. `always_allow`
/// persists the tool name in the session-scoped allow-list so later
/// calls to the same tool in this session skip the prompt entirely.
#[derive(Debug, Clone)]
pub struct PermissionDecision {
    pub approved: bool,
    pub always_allow: bool,
}

/// Events the orchestrator emits while running a turn. The caller drives
/// the UI off these and, for `ToolPermissionRequest`, eventually calls
/// back into `ChatOrchestrator::resolve_permission` with the matching
/// `request_id`.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    StateChanged(OrchestratorState),
    TextDelta(String),
    ToolPermissionRequest { request_id: String, tool_name: String, purpose: String, call: ToolCall },
    ToolCallStart { id: String, name: String, arguments: serde_json::Value },
    ToolCallEnd { id: String, name: String, success: bool, error: Option<String>, result: Option<serde_json::Value> },
}
