use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form attribute bag attached to every record variant.
///
/// Readers must tolerate absent keys; writers only emit the map when
/// non-empty so the wire format stays compact.
pub type Attrs = BTreeMap<String, serde_json::Value>;

/// Epoch milliseconds. Advisory wall-clock only — never a total order.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// What produced a task span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Tool,
    Skill,
    Model,
    Message,
    Manual,
}

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Ok,
    Error,
    Unknown,
}

impl TaskStatus {
    /// Severity rank used when merging racing close requests:
    /// `error > unknown > ok`.
    pub fn severity(self) -> u8 {
        match self {
            TaskStatus::Error => 3,
            TaskStatus::Unknown => 2,
            TaskStatus::Ok => 1,
        }
    }

    /// Keep the higher-severity status of the two.
    pub fn merge(self, next: TaskStatus) -> TaskStatus {
        if next.severity() >= self.severity() {
            next
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOp {
    Upsert,
}

/// One line of a trace log.
///
/// Internally tagged on `type`; field names are camelCase on the wire:
///
/// ```json
/// {"type":"task_start","ts":1000,"taskId":"t1","sessionId":"s1","rootSessionId":"s1","kind":"tool","name":"bash"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// Capture session bracket: opened once per capture run, carries the
    /// effective capture configuration in `attrs`.
    #[serde(rename_all = "camelCase")]
    CaptureStart {
        capture_id: String,
        ts: i64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },
    #[serde(rename_all = "camelCase")]
    CaptureEnd { capture_id: String, ts: i64 },

    /// Declares or updates session identity. Idempotent: later upserts for
    /// the same `session_id` overwrite label and attrs.
    #[serde(rename_all = "camelCase")]
    Session {
        op: SessionOp,
        ts: i64,
        session_id: String,
        root_session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },

    #[serde(rename_all = "camelCase")]
    TaskStart {
        ts: i64,
        /// Unique within the whole log.
        task_id: String,
        session_id: String,
        root_session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_task_id: Option<String>,
        kind: TaskKind,
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },

    #[serde(rename_all = "camelCase")]
    TaskEnd {
        ts: i64,
        task_id: String,
        session_id: String,
        root_session_id: String,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens_in: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens_out: Option<u64>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },

    /// Point-in-time annotation, optionally parented to an open task.
    #[serde(rename_all = "camelCase")]
    Tracepoint {
        ts: i64,
        tp_id: String,
        session_id: String,
        root_session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_task_id: Option<String>,
        name: String,
        level: TraceLevel,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        links: Vec<Attrs>,
    },

    /// Named numeric sample scoped to a session.
    #[serde(rename_all = "camelCase")]
    Counter {
        ts: i64,
        name: String,
        session_id: String,
        root_session_id: String,
        value: f64,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },

    /// Labeled point event with no duration.
    #[serde(rename_all = "camelCase")]
    Marker {
        ts: i64,
        label: String,
        session_id: String,
        root_session_id: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: Attrs,
    },
}

impl TraceRecord {
    pub fn ts(&self) -> i64 {
        match self {
            TraceRecord::CaptureStart { ts, .. }
            | TraceRecord::CaptureEnd { ts, .. }
            | TraceRecord::Session { ts, .. }
            | TraceRecord::TaskStart { ts, .. }
            | TraceRecord::TaskEnd { ts, .. }
            | TraceRecord::Tracepoint { ts, .. }
            | TraceRecord::Counter { ts, .. }
            | TraceRecord::Marker { ts, .. } => *ts,
        }
    }

    /// `None` for capture brackets, which are not session-scoped.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            TraceRecord::CaptureStart { .. } | TraceRecord::CaptureEnd { .. } => None,
            TraceRecord::Session { session_id, .. }
            | TraceRecord::TaskStart { session_id, .. }
            | TraceRecord::TaskEnd { session_id, .. }
            | TraceRecord::Tracepoint { session_id, .. }
            | TraceRecord::Counter { session_id, .. }
            | TraceRecord::Marker { session_id, .. } => Some(session_id),
        }
    }

    /// The log-sharding key. `None` for capture brackets.
    pub fn root_session_id(&self) -> Option<&str> {
        match self {
            TraceRecord::CaptureStart { .. } | TraceRecord::CaptureEnd { .. } => None,
            TraceRecord::Session {
                root_session_id, ..
            }
            | TraceRecord::TaskStart {
                root_session_id, ..
            }
            | TraceRecord::TaskEnd {
                root_session_id, ..
            }
            | TraceRecord::Tracepoint {
                root_session_id, ..
            }
            | TraceRecord::Counter {
                root_session_id, ..
            }
            | TraceRecord::Marker {
                root_session_id, ..
            } => Some(root_session_id),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TraceRecord::CaptureStart { .. } => "capture_start",
            TraceRecord::CaptureEnd { .. } => "capture_end",
            TraceRecord::Session { .. } => "session",
            TraceRecord::TaskStart { .. } => "task_start",
            TraceRecord::TaskEnd { .. } => "task_end",
            TraceRecord::Tracepoint { .. } => "tracepoint",
            TraceRecord::Counter { .. } => "counter",
            TraceRecord::Marker { .. } => "marker",
        }
    }

    pub fn is_capture_bracket(&self) -> bool {
        matches!(
            self,
            TraceRecord::CaptureStart { .. } | TraceRecord::CaptureEnd { .. }
        )
    }
}
