//! Export of trace data: raw JSON, flattened CSV, and the trace-event
//! interchange format consumed by profiler UIs.

use crate::build::build_timeline;
use opentrace_core::TraceRecord;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    TraceEvent,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "trace-event" => Ok(ExportFormat::TraceEvent),
            other => Err(format!(
                "invalid format '{other}', expected one of: json, csv, trace-event"
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::TraceEvent => "trace-event",
        };
        f.write_str(label)
    }
}

/// Render records in the requested format. `now_ts` anchors active-task
/// durations for the timeline-derived trace-event output.
pub fn export_records(
    records: &[TraceRecord],
    format: ExportFormat,
    now_ts: i64,
) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(records),
        ExportFormat::Csv => Ok(export_csv(records)),
        ExportFormat::TraceEvent => export_trace_events(records, now_ts),
    }
}

const CSV_COLUMNS: &[&str] = &[
    "type",
    "ts",
    "sessionId",
    "rootSessionId",
    "taskId",
    "parentTaskId",
    "name",
    "kind",
    "status",
    "durationMs",
    "level",
    "value",
];

fn export_csv(records: &[TraceRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');

    for record in records {
        let flat = serde_json::to_value(record).unwrap_or_default();
        let cells: Vec<String> = CSV_COLUMNS
            .iter()
            .map(|column| {
                let value = match *column {
                    // Markers carry `label` where other records carry `name`.
                    "name" => flat.get("name").or_else(|| flat.get("label")),
                    column => flat.get(column),
                };
                csv_cell(value)
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_cell(value: Option<&serde_json::Value>) -> String {
    let text = match value {
        None | Some(serde_json::Value::Null) => return String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// One `ph="X"` complete event per completed task; `ts`/`dur` in
/// microseconds, one pid per session.
fn export_trace_events(
    records: &[TraceRecord],
    now_ts: i64,
) -> Result<String, serde_json::Error> {
    let timeline = build_timeline(records, now_ts);
    let mut pid_by_session: HashMap<&str, u64> = HashMap::new();
    let mut next_pid = 1u64;

    let events: Vec<serde_json::Value> = timeline
        .completed_tasks
        .iter()
        .map(|task| {
            let pid = *pid_by_session
                .entry(task.session_id.as_str())
                .or_insert_with(|| {
                    let pid = next_pid;
                    next_pid += 1;
                    pid
                });
            json!({
                "name": task.name,
                "cat": task.activity,
                "ph": "X",
                "ts": task.start_ts * 1000,
                "dur": task.duration_ms * 1000,
                "pid": pid,
                "tid": 1,
                "args": {
                    "sessionId": task.session_id,
                    "rootSessionId": task.root_session_id,
                    "taskId": task.task_id,
                    "agent": task.agent,
                    "activity": task.activity,
                    "status": task.status,
                    "parentTaskId": task.parent_task_id,
                },
            })
        })
        .collect();

    serde_json::to_string_pretty(&json!({ "traceEvents": events }))
}
