//! Record builders shared by downstream test code.

use crate::record::{Attrs, SessionOp, TaskKind, TaskStatus, TraceRecord};

pub fn task_start(ts: i64, task_id: &str, session_id: &str, kind: TaskKind, name: &str) -> TraceRecord {
    TraceRecord::TaskStart {
        ts,
        task_id: task_id.to_string(),
        session_id: session_id.to_string(),
        root_session_id: session_id.to_string(),
        parent_task_id: None,
        kind,
        name: name.to_string(),
        attrs: Attrs::new(),
    }
}

pub fn task_end(ts: i64, task_id: &str, session_id: &str, status: TaskStatus) -> TraceRecord {
    TraceRecord::TaskEnd {
        ts,
        task_id: task_id.to_string(),
        session_id: session_id.to_string(),
        root_session_id: session_id.to_string(),
        status,
        duration_ms: None,
        tokens_in: None,
        tokens_out: None,
        attrs: Attrs::new(),
    }
}

pub fn session_upsert(
    ts: i64,
    session_id: &str,
    root_session_id: &str,
    parent_session_id: Option<&str>,
    label: Option<&str>,
) -> TraceRecord {
    TraceRecord::Session {
        op: SessionOp::Upsert,
        ts,
        session_id: session_id.to_string(),
        root_session_id: root_session_id.to_string(),
        parent_session_id: parent_session_id.map(ToString::to_string),
        label: label.map(ToString::to_string),
        attrs: Attrs::new(),
    }
}

pub fn attrs(entries: &[(&str, serde_json::Value)]) -> Attrs {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Attach attrs to a record built by the helpers above.
pub fn with_attrs(mut record: TraceRecord, extra: Attrs) -> TraceRecord {
    match &mut record {
        TraceRecord::CaptureStart { attrs, .. }
        | TraceRecord::Session { attrs, .. }
        | TraceRecord::TaskStart { attrs, .. }
        | TraceRecord::TaskEnd { attrs, .. }
        | TraceRecord::Tracepoint { attrs, .. }
        | TraceRecord::Counter { attrs, .. }
        | TraceRecord::Marker { attrs, .. } => attrs.extend(extra),
        TraceRecord::CaptureEnd { .. } => {}
    }
    record
}
