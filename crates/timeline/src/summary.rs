//! Aggregate summary over a full record set, for `opentrace analyze`.

use crate::build::build_timeline;
use crate::view::{AgentActivityRow, TaskState};
use opentrace_core::TraceRecord;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowTask {
    pub name: String,
    pub count: u64,
    pub avg_duration_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub total_records: usize,
    pub total_sessions: usize,
    pub total_tasks: usize,
    pub error_tasks: u64,
    pub total_tracepoints: usize,
    pub total_counters: usize,
    pub avg_task_duration_ms: f64,
    pub p95_task_duration_ms: i64,
    pub top_slow_tasks: Vec<SlowTask>,
    pub by_agent_activity: Vec<AgentActivityRow>,
}

const TOP_SLOW_LIMIT: usize = 10;

pub fn summarize(records: &[TraceRecord], now_ts: i64) -> TraceSummary {
    let timeline = build_timeline(records, now_ts);
    let tasks = &timeline.completed_tasks;

    let mut durations: Vec<i64> = tasks.iter().map(|task| task.duration_ms).collect();
    durations.sort_unstable();
    let avg = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };
    let p95 = if durations.is_empty() {
        0
    } else {
        let idx = ((durations.len() as f64) * 0.95).floor() as usize;
        durations[idx.min(durations.len() - 1)]
    };

    let mut error_tasks = 0u64;
    let mut per_name: HashMap<&str, (u64, i64, u64)> = HashMap::new();
    for task in tasks {
        if task.status == TaskState::Error {
            error_tasks += 1;
        }
        let entry = per_name.entry(task.name.as_str()).or_insert((0, 0, 0));
        entry.0 += 1;
        entry.1 += task.duration_ms;
        if task.status == TaskState::Error {
            entry.2 += 1;
        }
    }

    let mut top_slow_tasks: Vec<SlowTask> = per_name
        .into_iter()
        .map(|(name, (count, total, errors))| SlowTask {
            name: name.to_string(),
            count,
            avg_duration_ms: total as f64 / count as f64,
            error_rate: errors as f64 / count as f64,
        })
        .collect();
    top_slow_tasks.sort_by(|a, b| {
        b.avg_duration_ms
            .total_cmp(&a.avg_duration_ms)
            .then_with(|| a.name.cmp(&b.name))
    });
    top_slow_tasks.truncate(TOP_SLOW_LIMIT);

    TraceSummary {
        total_records: records.len(),
        total_sessions: timeline.sessions.len(),
        total_tasks: tasks.len(),
        error_tasks,
        total_tracepoints: timeline.tracepoints.len(),
        total_counters: timeline.counters.len(),
        avg_task_duration_ms: avg,
        p95_task_duration_ms: p95,
        top_slow_tasks,
        by_agent_activity: timeline.by_agent_activity,
    }
}
