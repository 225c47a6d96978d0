//! Derived entities: recomputed from records on every reconstruction call,
//! discarded after use. None of these own persistent state.

use opentrace_core::{Attrs, TaskKind, TaskStatus, TraceLevel};
use serde::Serialize;
use std::collections::BTreeMap;

/// Display status of a task span: a terminal status, or still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Ok,
    Error,
    Unknown,
    Running,
}

impl From<TaskStatus> for TaskState {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Ok => TaskState::Ok,
            TaskStatus::Error => TaskState::Error,
            TaskStatus::Unknown => TaskState::Unknown,
        }
    }
}

/// One reconstructed task span: a paired start+end, or a start-only active
/// task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task_id: String,
    pub session_id: String,
    pub root_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskKind>,
    pub agent: String,
    pub activity: String,
    pub status: TaskState,
    pub start_ts: i64,
    pub end_ts: i64,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

impl TaskView {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)?.as_str().map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracepointView {
    pub ts: i64,
    pub tp_id: String,
    pub session_id: String,
    pub root_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    pub name: String,
    pub level: TraceLevel,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterView {
    pub ts: i64,
    pub name: String,
    pub session_id: String,
    pub root_session_id: String,
    pub value: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

/// A node in the session tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNode {
    pub session_id: String,
    pub root_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    pub title: String,
    pub children: Vec<String>,
}

/// A root session and the member sessions of its subtree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSessionView {
    pub root_session_id: String,
    pub title: String,
    pub session_ids: Vec<String>,
}

/// Aggregate row for one `(agent, activity)` pair over completed tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActivityRow {
    pub agent: String,
    pub activity: String,
    pub count: u64,
    pub total_ms: i64,
    pub avg_ms: f64,
    pub errors: u64,
}

/// The full reconstructed projection over one record set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Max `ts` seen across records; reported for staleness math, never
    /// substituted for the caller's clock.
    pub latest_ts: i64,
    pub active_tasks: Vec<TaskView>,
    pub completed_tasks: Vec<TaskView>,
    pub tracepoints: Vec<TracepointView>,
    pub counters: Vec<CounterView>,
    pub sessions: Vec<SessionNode>,
    pub roots: Vec<RootSessionView>,
    pub by_agent_activity: Vec<AgentActivityRow>,
}

impl Timeline {
    /// Completed and active spans of one session, for lane packing.
    pub fn session_tasks(&self, session_id: &str) -> Vec<&TaskView> {
        self.completed_tasks
            .iter()
            .chain(self.active_tasks.iter())
            .filter(|task| task.session_id == session_id)
            .collect()
    }
}

pub const UNKNOWN_AGENT: &str = "unknown-agent";
pub const UNKNOWN_ACTIVITY: &str = "unknown-activity";
