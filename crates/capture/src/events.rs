//! Normalized host-runtime events the capture session consumes.
//!
//! The host adapter (out of scope here) is responsible for mapping its own
//! callback surface onto these shapes; the capture session only translates
//! them into trace records.

use opentrace_core::Attrs;

/// A tool invocation began.
#[derive(Debug, Clone, Default)]
pub struct ToolStartEvent {
    pub ts: Option<i64>,
    pub session_id: String,
    pub tool_name: String,
    /// Host call id; doubles as the task id so the matching end can pair.
    pub call_id: Option<String>,
    pub input: Option<serde_json::Value>,
    pub attrs: Attrs,
}

/// A tool invocation finished.
#[derive(Debug, Clone, Default)]
pub struct ToolEndEvent {
    pub ts: Option<i64>,
    pub session_id: String,
    pub tool_name: String,
    pub call_id: Option<String>,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub tokens_in: Option<u64>,
    pub tokens_out: Option<u64>,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub ts: Option<i64>,
    pub session_id: String,
    pub parent_session_id: Option<String>,
    pub title: Option<String>,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone)]
pub enum SessionLifecycle {
    Created(SessionUpdate),
    Updated(SessionUpdate),
    Idle { session_id: String, ts: Option<i64> },
    Deleted { session_id: String, ts: Option<i64> },
    Error { session_id: String, ts: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartToolStatus {
    Running,
    Completed,
    Error,
}

/// Streaming message-part updates: fine-grained sub-task activity whose
/// start acknowledgment may race its end signal.
#[derive(Debug, Clone)]
pub enum MessagePartEvent {
    Reasoning {
        session_id: String,
        part_id: String,
        start_ts: Option<i64>,
        end_ts: Option<i64>,
    },
    Tool {
        session_id: String,
        call_id: String,
        tool_name: String,
        status: PartToolStatus,
        start_ts: Option<i64>,
        end_ts: Option<i64>,
    },
}

/// An assistant turn began; opens the session's `agent_run:*` task.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurnEvent {
    pub ts: Option<i64>,
    pub session_id: String,
    pub agent: String,
}

/// A user message arrived; captured as a tracepoint when enabled.
#[derive(Debug, Clone, Default)]
pub struct UserMessageEvent {
    pub ts: Option<i64>,
    pub session_id: String,
    pub message_id: Option<String>,
    pub text: Option<String>,
}
