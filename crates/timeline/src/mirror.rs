//! Mirrored-task handling.
//!
//! The capture side can emit the same unit of work twice: a raw `kind=tool`
//! task keyed by the host call id, and a semantic `kind=manual` task named
//! `activity:*` that references that call id in `attrs.callID` (or via its
//! `parentTaskId`). The activity task is canonical for display; before the
//! raw task is dropped, its payload details are folded into the canonical
//! one.

use crate::view::TaskView;
use opentrace_core::TaskKind;
use regex::Regex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

const INTENT_MAX: usize = 140;

/// The call id an activity task mirrors, if any.
fn mirrored_call_id<'a>(task: &'a TaskView, tool_ids: &HashSet<&str>) -> Option<&'a str> {
    if task.kind != Some(TaskKind::Manual) || !task.name.starts_with("activity:") {
        return None;
    }
    if let Some(call_id) = task.attr_str("callID") {
        return Some(call_id);
    }
    task.parent_task_id
        .as_deref()
        .filter(|parent| tool_ids.contains(parent))
}

fn tool_task_ids<'a>(completed: &'a [TaskView], active: &'a [TaskView]) -> HashSet<&'a str> {
    completed
        .iter()
        .chain(active.iter())
        .filter(|task| task.kind == Some(TaskKind::Tool))
        .map(|task| task.task_id.as_str())
        .collect()
}

/// Every call id referenced by an `activity:*` manual task.
pub(crate) fn collect_mirrored_call_ids(
    completed: &[TaskView],
    active: &[TaskView],
) -> HashSet<String> {
    let tool_ids = tool_task_ids(completed, active);
    completed
        .iter()
        .chain(active.iter())
        .filter_map(|task| mirrored_call_id(task, &tool_ids))
        .map(ToString::to_string)
        .collect()
}

/// Drop raw tool tasks whose call id is covered by an activity task — the
/// pair would double-count one unit of work.
pub(crate) fn dedupe_mirrored(tasks: Vec<TaskView>, mirrored: &HashSet<String>) -> Vec<TaskView> {
    if mirrored.is_empty() {
        return tasks;
    }
    tasks
        .into_iter()
        .filter(|task| {
            task.kind != Some(TaskKind::Tool) || !mirrored.contains(&task.task_id)
        })
        .collect()
}

/// Fold tool-task detail (name, previews, spawned child session, derived
/// intent) into the activity tasks that mirror them.
pub(crate) fn enrich_mirrored(
    tasks: Vec<TaskView>,
    completed: &[TaskView],
    active: &[TaskView],
) -> Vec<TaskView> {
    let tool_ids = tool_task_ids(completed, active);
    let tool_by_call_id: HashMap<&str, &TaskView> = completed
        .iter()
        .chain(active.iter())
        .filter(|task| task.kind == Some(TaskKind::Tool))
        .map(|task| (task.task_id.as_str(), task))
        .collect();

    tasks
        .into_iter()
        .map(|mut task| {
            let Some(tool_task) = mirrored_call_id(&task, &tool_ids)
                .and_then(|call_id| tool_by_call_id.get(call_id))
            else {
                return task;
            };

            let tool_name = tool_task
                .attr_str("toolName")
                .unwrap_or(&tool_task.name)
                .to_string();
            let input_preview = tool_task.attr_str("inputPreview").map(ToString::to_string);
            let output_preview = tool_task.attr_str("outputPreview").map(ToString::to_string);
            let child_session_id = tool_task
                .attrs
                .get("metadata")
                .and_then(|meta| meta.get("sessionId"))
                .and_then(|value| value.as_str())
                .or_else(|| tool_task.attr_str("childSessionId"))
                .map(ToString::to_string);

            task.attrs
                .insert("toolTaskId".to_string(), json!(tool_task.task_id.clone()));
            task.attrs
                .insert("toolName".to_string(), json!(tool_name.clone()));
            if let Some(input) = &input_preview {
                task.attrs
                    .insert("toolInputPreview".to_string(), json!(input));
            }
            if let Some(output) = &output_preview {
                task.attrs
                    .insert("toolOutputPreview".to_string(), json!(output));
            }
            if let Some(child) = &child_session_id {
                task.attrs
                    .insert("toolChildSessionId".to_string(), json!(child));
            }
            if let Some(doing) = derive_tool_intent(&tool_name, input_preview.as_deref()) {
                task.attrs.insert("doing".to_string(), json!(doing));
            }
            task
        })
        .collect()
}

/// One-line summary of what a tool call was doing, from its input preview.
pub fn derive_tool_intent(tool_name: &str, input_preview: Option<&str>) -> Option<String> {
    let preview = input_preview?;
    let payload: Option<serde_json::Value> = serde_json::from_str(preview).ok();
    let field = |name: &str| -> Option<String> {
        payload
            .as_ref()
            .and_then(|value| value.get(name))
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
            .or_else(|| extract_preview_field(preview, name))
    };

    if tool_name == "bash" {
        return field("command").map(|command| truncate_head(&command, INTENT_MAX));
    }
    if tool_name == "task" {
        let parts: Vec<String> = [field("subagent_type"), field("description")]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            return None;
        }
        return Some(truncate_head(&parts.join(" / "), INTENT_MAX));
    }
    if let Some(path) = field("filePath") {
        return Some(truncate_head(&path, INTENT_MAX));
    }
    if let Some(pattern) = field("pattern") {
        return Some(truncate_head(&pattern, INTENT_MAX));
    }
    Some(truncate_head(preview, INTENT_MAX))
}

/// Pull one string field out of a preview that may be truncated JSON.
fn extract_preview_field(preview: &str, field: &str) -> Option<String> {
    static FIELD_RE: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
        ["command", "subagent_type", "description", "filePath", "pattern"]
            .into_iter()
            .map(|name| {
                let pattern = format!(r#""{name}"\s*:\s*"((?:\\.|[^"])*)""#);
                (name, Regex::new(&pattern).expect("static preview pattern"))
            })
            .collect()
    });
    let re = FIELD_RE.get(field)?;
    let raw = re.captures(preview)?.get(1)?.as_str();
    // Unescape through serde; fall back to the raw capture.
    serde_json::from_str::<String>(&format!("\"{raw}\"")).ok().or_else(|| Some(raw.to_string()))
}

fn truncate_head(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let head: String = value.chars().take(limit).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::TaskState;
    use opentrace_core::Attrs;

    fn view(task_id: &str, kind: TaskKind, name: &str, attrs: Attrs) -> TaskView {
        TaskView {
            task_id: task_id.to_string(),
            session_id: "s1".to_string(),
            root_session_id: "s1".to_string(),
            parent_task_id: None,
            name: name.to_string(),
            kind: Some(kind),
            agent: "a".to_string(),
            activity: "tool".to_string(),
            status: TaskState::Ok,
            start_ts: 0,
            end_ts: 10,
            duration_ms: 10,
            attrs,
        }
    }

    #[test]
    fn dedupe_removes_only_mirrored_tool_tasks() {
        let raw = view("call_1", TaskKind::Tool, "bash", Attrs::new());
        let other = view("call_2", TaskKind::Tool, "grep", Attrs::new());
        let activity = view(
            "t2",
            TaskKind::Manual,
            "activity:tool:bash",
            opentrace_core::testing::attrs(&[("callID", json!("call_1"))]),
        );

        let completed = vec![raw, other, activity];
        let mirrored = collect_mirrored_call_ids(&completed, &[]);
        let deduped = dedupe_mirrored(completed, &mirrored);

        let ids: Vec<&str> = deduped.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["call_2", "t2"]);
    }

    #[test]
    fn parent_task_reference_also_counts_as_mirror() {
        let raw = view("call_9", TaskKind::Tool, "bash", Attrs::new());
        let mut activity = view("t1", TaskKind::Manual, "activity:coding:bash", Attrs::new());
        activity.parent_task_id = Some("call_9".to_string());

        let completed = vec![raw, activity];
        let mirrored = collect_mirrored_call_ids(&completed, &[]);
        assert!(mirrored.contains("call_9"));
    }

    #[test]
    fn plain_manual_tasks_are_not_mirrors() {
        let raw = view("call_1", TaskKind::Tool, "bash", Attrs::new());
        let manual = view(
            "t1",
            TaskKind::Manual,
            "phase:deploy",
            opentrace_core::testing::attrs(&[("callID", json!("call_1"))]),
        );
        let completed = vec![raw, manual];
        let mirrored = collect_mirrored_call_ids(&completed, &[]);
        assert!(mirrored.is_empty());
    }

    #[test]
    fn enrich_copies_tool_detail_onto_activity_task() {
        let raw = view(
            "call_1",
            TaskKind::Tool,
            "bash",
            opentrace_core::testing::attrs(&[
                ("toolName", json!("bash")),
                ("inputPreview", json!(r#"{"command":"cargo check"}"#)),
                ("outputPreview", json!("Finished dev profile")),
            ]),
        );
        let activity = view(
            "t2",
            TaskKind::Manual,
            "activity:coding:bash",
            opentrace_core::testing::attrs(&[("callID", json!("call_1"))]),
        );

        let completed = vec![raw, activity];
        let enriched = enrich_mirrored(completed.clone(), &completed, &[]);
        let enriched_activity = enriched.iter().find(|t| t.task_id == "t2").unwrap();

        assert_eq!(enriched_activity.attr_str("toolTaskId"), Some("call_1"));
        assert_eq!(enriched_activity.attr_str("doing"), Some("cargo check"));
        assert_eq!(
            enriched_activity.attr_str("toolOutputPreview"),
            Some("Finished dev profile")
        );
    }

    #[test]
    fn intent_for_task_tool_combines_subagent_and_description() {
        let doing = derive_tool_intent(
            "task",
            Some(r#"{"subagent_type":"researcher","description":"find flaky tests"}"#),
        );
        assert_eq!(doing.as_deref(), Some("researcher / find flaky tests"));
    }

    #[test]
    fn intent_survives_truncated_preview_json() {
        // The preview was cut mid-object; field extraction still works.
        let doing = derive_tool_intent("bash", Some(r#"{"command":"make all","cwd":"/ho"#));
        assert_eq!(doing.as_deref(), Some("make all"));
    }

    #[test]
    fn intent_falls_back_to_file_path_then_preview() {
        assert_eq!(
            derive_tool_intent("edit", Some(r#"{"filePath":"src/main.rs"}"#)).as_deref(),
            Some("src/main.rs")
        );
        assert_eq!(
            derive_tool_intent("webfetch", Some("plain text preview")).as_deref(),
            Some("plain text preview")
        );
        assert_eq!(derive_tool_intent("bash", None), None);
    }
}
