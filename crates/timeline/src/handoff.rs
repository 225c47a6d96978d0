//! Handoff inference: link the task that dispatched a child session to that
//! child's first `agent_run:*` task.
//!
//! Heuristic, per child session: take its earliest `agent_run` task, find
//! the session-tree parent, prefer dispatch-looking tasks there (`task`
//! tool, a `:task` or `subagent` name), and pick the candidate whose start
//! is closest in time to the child task's start. At most one link per
//! child session.

use crate::view::{TaskView, Timeline};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffLink {
    pub parent_session_id: String,
    pub child_session_id: String,
    pub parent_task_id: String,
    pub child_task_id: String,
}

fn looks_like_dispatch(task: &TaskView) -> bool {
    let tool = task.attr_str("toolName").or_else(|| task.attr_str("tool"));
    tool == Some("task")
        || task.name == "task"
        || task.name.contains(":task")
        || task.name.contains("subagent")
}

pub fn infer_handoffs(timeline: &Timeline) -> Vec<HandoffLink> {
    let mut tasks_by_session: HashMap<&str, Vec<&TaskView>> = HashMap::new();
    let mut earliest_agent_run: HashMap<&str, &TaskView> = HashMap::new();
    for task in timeline
        .completed_tasks
        .iter()
        .chain(timeline.active_tasks.iter())
    {
        tasks_by_session
            .entry(task.session_id.as_str())
            .or_default()
            .push(task);
        if task.name.starts_with("agent_run:") {
            earliest_agent_run
                .entry(task.session_id.as_str())
                .and_modify(|current| {
                    if task.start_ts < current.start_ts {
                        *current = task;
                    }
                })
                .or_insert(task);
        }
    }

    let parent_of: HashMap<&str, &str> = timeline
        .sessions
        .iter()
        .filter_map(|node| {
            node.parent_session_id
                .as_deref()
                .map(|parent| (node.session_id.as_str(), parent))
        })
        .collect();

    let mut links = Vec::new();
    for (child_session_id, child_task) in &earliest_agent_run {
        let Some(parent_session_id) = parent_of.get(child_session_id) else {
            continue;
        };
        let Some(parent_tasks) = tasks_by_session.get(parent_session_id) else {
            continue;
        };

        let dispatch: Vec<&&TaskView> = parent_tasks
            .iter()
            .filter(|task| looks_like_dispatch(task))
            .collect();
        let pool: Vec<&&TaskView> = if dispatch.is_empty() {
            parent_tasks.iter().collect()
        } else {
            dispatch
        };

        let source = pool.into_iter().min_by_key(|task| {
            (
                (task.start_ts - child_task.start_ts).abs(),
                task.end_ts,
                task.task_id.clone(),
            )
        });
        let Some(source) = source else { continue };

        links.push(HandoffLink {
            parent_session_id: parent_session_id.to_string(),
            child_session_id: child_session_id.to_string(),
            parent_task_id: source.task_id.clone(),
            child_task_id: child_task.task_id.clone(),
        });
    }

    links.sort_by(|a, b| a.child_session_id.cmp(&b.child_session_id));
    links
}
