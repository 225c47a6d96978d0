//! Timeline reconstruction: a pure, synchronous projection over an
//! immutable snapshot of records. Holds no state between calls; callers
//! simply re-run it when they want a fresher view.
//!
//! The caller supplies wall-clock `now_ts` for open-ended active spans.
//! `latest_ts` (the max record timestamp) is reported alongside so callers
//! can compute ingestion lag, but it never substitutes for the clock.

use crate::attribute::{attr_str, classify_activity, AgentResolver, StartRef};
use crate::mirror::{collect_mirrored_call_ids, dedupe_mirrored, enrich_mirrored};
use crate::view::{
    AgentActivityRow, CounterView, RootSessionView, SessionNode, TaskState, TaskView, Timeline,
    TracepointView,
};
use opentrace_core::ids::shorten_id;
use opentrace_core::{Attrs, TraceRecord};
use std::collections::{HashMap, HashSet};

pub fn build_timeline(records: &[TraceRecord], now_ts: i64) -> Timeline {
    let latest_ts = records.iter().map(TraceRecord::ts).max().unwrap_or(0);

    // Pass 1: index starts, collect declared sessions.
    let mut starts: HashMap<&str, StartRef<'_>> = HashMap::new();
    let mut ordered_start_ids: Vec<&str> = Vec::new();
    let mut session_map: HashMap<String, SessionNode> = HashMap::new();
    let mut session_order: Vec<String> = Vec::new();
    let mut roots_map: HashMap<String, RootSessionView> = HashMap::new();
    let mut root_order: Vec<String> = Vec::new();

    for record in records {
        match record {
            TraceRecord::TaskStart {
                ts,
                task_id,
                session_id,
                root_session_id,
                parent_task_id,
                kind,
                name,
                attrs,
            } => {
                if !starts.contains_key(task_id.as_str()) {
                    ordered_start_ids.push(task_id);
                }
                starts.insert(
                    task_id,
                    StartRef {
                        ts: *ts,
                        session_id,
                        root_session_id,
                        parent_task_id: parent_task_id.as_deref(),
                        kind: *kind,
                        name,
                        attrs,
                    },
                );
            }
            TraceRecord::Session {
                session_id,
                root_session_id,
                parent_session_id,
                label,
                attrs,
                ..
            } => {
                let title = attr_str(attrs, "sessionTitle")
                    .or(label.as_deref())
                    .map(ToString::to_string)
                    .unwrap_or_else(|| shorten_id(session_id));
                if !session_map.contains_key(session_id) {
                    session_order.push(session_id.clone());
                }
                session_map.insert(
                    session_id.clone(),
                    SessionNode {
                        session_id: session_id.clone(),
                        root_session_id: root_session_id.clone(),
                        parent_session_id: parent_session_id.clone(),
                        title: title.clone(),
                        children: Vec::new(),
                    },
                );

                let root = ensure_root(
                    &mut roots_map,
                    &mut root_order,
                    root_session_id,
                    session_id == root_session_id,
                    Some(title.as_str()),
                );
                if !root.session_ids.iter().any(|id| id == session_id) {
                    root.session_ids.push(session_id.clone());
                }
            }
            _ => {}
        }
    }

    // Pass 2: any record referencing an undeclared session still gets a
    // synthesized node and root membership.
    for record in records {
        let (Some(session_id), Some(root_session_id)) =
            (record.session_id(), record.root_session_id())
        else {
            continue;
        };
        let root = ensure_root(&mut roots_map, &mut root_order, root_session_id, false, None);
        if !root.session_ids.iter().any(|id| id == session_id) {
            root.session_ids.push(session_id.to_string());
        }
        if !session_map.contains_key(session_id) {
            session_order.push(session_id.to_string());
            session_map.insert(
                session_id.to_string(),
                SessionNode {
                    session_id: session_id.to_string(),
                    root_session_id: root_session_id.to_string(),
                    parent_session_id: None,
                    title: shorten_id(session_id),
                    children: Vec::new(),
                },
            );
        }
    }

    // Link children, skipping self-references and duplicates.
    for session_id in &session_order {
        let Some(parent_id) = session_map
            .get(session_id)
            .and_then(|node| node.parent_session_id.clone())
        else {
            continue;
        };
        if parent_id == *session_id {
            continue;
        }
        if let Some(parent) = session_map.get_mut(&parent_id) {
            if !parent.children.iter().any(|id| id == session_id) {
                parent.children.push(session_id.clone());
            }
        }
    }

    let mut resolver = AgentResolver::new(&starts, &ordered_start_ids);

    // Pass 3: pair ends with starts.
    let mut completed: Vec<TaskView> = Vec::new();
    let mut ended: HashSet<&str> = HashSet::new();
    for record in records {
        let TraceRecord::TaskEnd {
            ts,
            task_id,
            session_id,
            root_session_id,
            status,
            duration_ms,
            attrs,
            ..
        } = record
        else {
            continue;
        };
        ended.insert(task_id);
        let start = starts.get(task_id.as_str());

        let start_ts = match (start, duration_ms) {
            (Some(start), _) => start.ts,
            (None, Some(duration)) => ts - duration,
            (None, None) => *ts,
        };
        let duration_ms = (*duration_ms).unwrap_or_else(|| (ts - start_ts).max(0));

        let name = start
            .map(|s| s.name.to_string())
            .or_else(|| attr_str(attrs, "toolName").map(ToString::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        let kind = start.map(|s| s.kind);
        let explicit_activity = start
            .and_then(|s| attr_str(s.attrs, "activity"))
            .or_else(|| attr_str(attrs, "activity"));

        completed.push(TaskView {
            task_id: task_id.clone(),
            session_id: session_id.clone(),
            root_session_id: root_session_id.clone(),
            parent_task_id: start
                .and_then(|s| s.parent_task_id.map(ToString::to_string))
                .or_else(|| attr_str(attrs, "parentTaskId").map(ToString::to_string)),
            agent: resolver.resolve(Some(task_id.as_str()), Some(attrs)),
            activity: classify_activity(explicit_activity, &name, kind),
            name,
            kind,
            status: TaskState::from(*status),
            start_ts,
            end_ts: *ts,
            duration_ms,
            attrs: merge_attrs(start.map(|s| s.attrs), Some(attrs)),
        });
    }

    // Every unmatched start is active until an end shows up.
    let mut active: Vec<TaskView> = Vec::new();
    for task_id in &ordered_start_ids {
        if ended.contains(task_id) {
            continue;
        }
        let Some(start) = starts.get(task_id) else { continue };
        let end_ts = now_ts.max(start.ts);
        active.push(TaskView {
            task_id: task_id.to_string(),
            session_id: start.session_id.to_string(),
            root_session_id: start.root_session_id.to_string(),
            parent_task_id: start.parent_task_id.map(ToString::to_string),
            agent: resolver.resolve(Some(*task_id), None),
            activity: classify_activity(
                attr_str(start.attrs, "activity"),
                start.name,
                Some(start.kind),
            ),
            name: start.name.to_string(),
            kind: Some(start.kind),
            status: TaskState::Running,
            start_ts: start.ts,
            end_ts,
            duration_ms: (end_ts - start.ts).max(0),
            attrs: merge_attrs(Some(start.attrs), None),
        });
    }

    // Mirror handling: enrich from raw tool tasks, then hide them. The
    // mirrored set spans both lists so an activity task in one never leaves
    // its raw twin visible in the other.
    let enriched_completed = enrich_mirrored(completed.clone(), &completed, &active);
    let enriched_active = enrich_mirrored(active.clone(), &completed, &active);
    let mirrored = collect_mirrored_call_ids(&enriched_completed, &enriched_active);
    let mut completed = dedupe_mirrored(enriched_completed, &mirrored);
    let mut active = dedupe_mirrored(enriched_active, &mirrored);

    let by_agent_activity = aggregate_by_agent_activity(&completed);

    active.sort_by(|a, b| {
        b.duration_ms
            .cmp(&a.duration_ms)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    completed.sort_by(|a, b| {
        b.end_ts
            .cmp(&a.end_ts)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    let mut sessions: Vec<SessionNode> = session_order
        .iter()
        .filter_map(|id| session_map.get(id).cloned())
        .collect();
    sessions.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.session_id.cmp(&b.session_id)));
    let mut roots: Vec<RootSessionView> = root_order
        .iter()
        .filter_map(|id| roots_map.get(id).cloned())
        .collect();
    roots.sort_by(|a, b| {
        a.title
            .cmp(&b.title)
            .then_with(|| a.root_session_id.cmp(&b.root_session_id))
    });

    Timeline {
        latest_ts,
        active_tasks: active,
        completed_tasks: completed,
        tracepoints: collect_tracepoints(records),
        counters: collect_counters(records),
        sessions,
        roots,
        by_agent_activity,
    }
}

fn ensure_root<'a>(
    roots_map: &'a mut HashMap<String, RootSessionView>,
    root_order: &mut Vec<String>,
    root_session_id: &str,
    is_root_session: bool,
    title: Option<&str>,
) -> &'a mut RootSessionView {
    if !roots_map.contains_key(root_session_id) {
        root_order.push(root_session_id.to_string());
        roots_map.insert(
            root_session_id.to_string(),
            RootSessionView {
                root_session_id: root_session_id.to_string(),
                title: shorten_id(root_session_id),
                session_ids: Vec::new(),
            },
        );
    }
    let root = roots_map
        .get_mut(root_session_id)
        .expect("root just ensured");
    // The root session's own title names the whole subtree.
    if is_root_session {
        if let Some(title) = title {
            root.title = title.to_string();
        }
    }
    root
}

fn merge_attrs(start: Option<&Attrs>, end: Option<&Attrs>) -> Attrs {
    let mut merged = Attrs::new();
    if let Some(start) = start {
        merged.extend(start.clone());
    }
    if let Some(end) = end {
        merged.extend(end.clone());
    }
    merged
}

fn aggregate_by_agent_activity(completed: &[TaskView]) -> Vec<AgentActivityRow> {
    let mut rows: HashMap<(String, String), AgentActivityRow> = HashMap::new();
    for task in completed {
        let key = (task.agent.clone(), task.activity.clone());
        let row = rows.entry(key).or_insert_with(|| AgentActivityRow {
            agent: task.agent.clone(),
            activity: task.activity.clone(),
            count: 0,
            total_ms: 0,
            avg_ms: 0.0,
            errors: 0,
        });
        row.count += 1;
        row.total_ms += task.duration_ms;
        if task.status == TaskState::Error {
            row.errors += 1;
        }
    }

    let mut rows: Vec<AgentActivityRow> = rows
        .into_values()
        .map(|mut row| {
            row.avg_ms = if row.count > 0 {
                row.total_ms as f64 / row.count as f64
            } else {
                0.0
            };
            row
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_ms
            .cmp(&a.total_ms)
            .then_with(|| a.agent.cmp(&b.agent))
            .then_with(|| a.activity.cmp(&b.activity))
    });
    rows
}

fn collect_tracepoints(records: &[TraceRecord]) -> Vec<TracepointView> {
    records
        .iter()
        .filter_map(|record| match record {
            TraceRecord::Tracepoint {
                ts,
                tp_id,
                session_id,
                root_session_id,
                parent_task_id,
                name,
                level,
                attrs,
                ..
            } => Some(TracepointView {
                ts: *ts,
                tp_id: tp_id.clone(),
                session_id: session_id.clone(),
                root_session_id: root_session_id.clone(),
                parent_task_id: parent_task_id.clone(),
                name: name.clone(),
                level: *level,
                attrs: attrs.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn collect_counters(records: &[TraceRecord]) -> Vec<CounterView> {
    records
        .iter()
        .filter_map(|record| match record {
            TraceRecord::Counter {
                ts,
                name,
                session_id,
                root_session_id,
                value,
                attrs,
            } => Some(CounterView {
                ts: *ts,
                name: name.clone(),
                session_id: session_id.clone(),
                root_session_id: root_session_id.clone(),
                value: *value,
                attrs: attrs.clone(),
            }),
            _ => None,
        })
        .collect()
}
