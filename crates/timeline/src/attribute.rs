//! Agent attribution and activity classification.

use crate::view::{UNKNOWN_ACTIVITY, UNKNOWN_AGENT};
use opentrace_core::{Attrs, TaskKind};
use std::collections::{HashMap, HashSet};

pub(crate) fn attr_str<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a str> {
    attrs
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// `agent_run:<agent>` / `agent:<agent>` task names carry their agent.
pub fn parse_agent_from_name(name: &str) -> Option<&str> {
    let lower = name.to_ascii_lowercase();
    let tail = if lower.starts_with("agent_run:") {
        &name["agent_run:".len()..]
    } else if lower.starts_with("agent:") {
        &name["agent:".len()..]
    } else {
        return None;
    };
    let tail = tail.trim();
    (!tail.is_empty()).then_some(tail)
}

/// Fields of a `task_start` the resolver needs, borrowed from the record.
pub(crate) struct StartRef<'a> {
    pub ts: i64,
    pub session_id: &'a str,
    pub root_session_id: &'a str,
    pub parent_task_id: Option<&'a str>,
    pub kind: TaskKind,
    pub name: &'a str,
    pub attrs: &'a Attrs,
}

/// Resolves the agent for a task with the precedence:
/// end-record attr, start-record attr, name prefix, parent task
/// (recursively), per-session default, `unknown-agent`. Results are cached
/// per task id.
pub(crate) struct AgentResolver<'a> {
    starts: &'a HashMap<&'a str, StartRef<'a>>,
    session_default: HashMap<&'a str, &'a str>,
    cache: HashMap<String, Option<String>>,
}

impl<'a> AgentResolver<'a> {
    /// `ordered_start_ids` preserves log order so the per-session default is
    /// the first attributable task of the session, deterministically.
    pub fn new(
        starts: &'a HashMap<&'a str, StartRef<'a>>,
        ordered_start_ids: &[&'a str],
    ) -> Self {
        let mut session_default: HashMap<&'a str, &'a str> = HashMap::new();
        for task_id in ordered_start_ids {
            let Some(start) = starts.get(task_id) else { continue };
            let inferred =
                attr_str(start.attrs, "agent").or_else(|| parse_agent_from_name(start.name));
            if let Some(agent) = inferred {
                session_default.entry(start.session_id).or_insert(agent);
            }
        }
        Self {
            starts,
            session_default,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, start_task_id: Option<&str>, end_attrs: Option<&Attrs>) -> String {
        if let Some(agent) = end_attrs.and_then(|attrs| attr_str(attrs, "agent")) {
            return agent.to_string();
        }
        start_task_id
            .and_then(|task_id| self.resolve_start(task_id))
            .unwrap_or_else(|| UNKNOWN_AGENT.to_string())
    }

    fn resolve_start(&mut self, task_id: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(task_id) {
            return cached.clone();
        }

        let mut found: Option<String> = None;
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(task_id);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let Some(start) = self.starts.get(id) else { break };
            if let Some(agent) =
                attr_str(start.attrs, "agent").or_else(|| parse_agent_from_name(start.name))
            {
                found = Some(agent.to_string());
                break;
            }
            current = start.parent_task_id;
        }

        let result = found.or_else(|| {
            let start = self.starts.get(task_id)?;
            self.session_default
                .get(start.session_id)
                .map(ToString::to_string)
        });
        self.cache.insert(task_id.to_string(), result.clone());
        result
    }
}

const TOOL_WORDS: &[&str] = &["tool", "mcp", "grep", "search", "fetch"];
const CODING_WORDS: &[&str] = &["code", "edit", "write", "patch", "compile", "test", "build", "fix"];
const REASONING_WORDS: &[&str] = &["reason", "think", "analysis", "plan", "reflect"];
const AGENT_WORDS: &[&str] = &["agent", "session", "skill"];

/// Ordered keyword classification; an explicit `attrs.activity` wins.
pub fn classify_activity(explicit: Option<&str>, name: &str, kind: Option<TaskKind>) -> String {
    if let Some(explicit) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return explicit.to_string();
    }

    let kind_label = match kind {
        Some(TaskKind::Tool) => "tool",
        Some(TaskKind::Skill) => "skill",
        Some(TaskKind::Model) => "model",
        Some(TaskKind::Message) => "message",
        Some(TaskKind::Manual) => "manual",
        None => "",
    };
    let sample = format!("{}|{}", name, kind_label).to_ascii_lowercase();
    let matches_any = |words: &[&str]| words.iter().any(|word| sample.contains(word));

    if kind == Some(TaskKind::Tool) || matches_any(TOOL_WORDS) {
        return "tool".to_string();
    }
    if matches_any(CODING_WORDS) {
        return "coding".to_string();
    }
    if matches_any(REASONING_WORDS) {
        return "reasoning".to_string();
    }
    if matches_any(AGENT_WORDS) {
        return "agent_run".to_string();
    }
    UNKNOWN_ACTIVITY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_name_prefixes() {
        assert_eq!(parse_agent_from_name("agent_run:builder"), Some("builder"));
        assert_eq!(parse_agent_from_name("agent: scout "), Some("scout"));
        assert_eq!(parse_agent_from_name("agent_run:"), None);
        assert_eq!(parse_agent_from_name("bash"), None);
    }

    #[test]
    fn explicit_activity_wins() {
        assert_eq!(
            classify_activity(Some("custom"), "bash", Some(TaskKind::Tool)),
            "custom"
        );
    }

    #[test]
    fn tool_kind_classifies_as_tool() {
        assert_eq!(classify_activity(None, "anything", Some(TaskKind::Tool)), "tool");
        assert_eq!(classify_activity(None, "grep files", None), "tool");
    }

    #[test]
    fn keyword_order_is_tool_coding_reasoning_agent() {
        assert_eq!(classify_activity(None, "edit main.rs", None), "coding");
        assert_eq!(classify_activity(None, "plan the refactor", None), "reasoning");
        assert_eq!(classify_activity(None, "skill:deploy", None), "agent_run");
        assert_eq!(classify_activity(None, "mystery", None), UNKNOWN_ACTIVITY);
    }

    fn start_ref<'a>(
        session_id: &'a str,
        parent: Option<&'a str>,
        name: &'a str,
        attrs: &'a Attrs,
    ) -> StartRef<'a> {
        StartRef {
            ts: 0,
            session_id,
            root_session_id: session_id,
            parent_task_id: parent,
            kind: TaskKind::Manual,
            name,
            attrs,
        }
    }

    #[test]
    fn resolves_through_parent_chain() {
        let empty = Attrs::new();
        let mut starts: HashMap<&str, StartRef<'_>> = HashMap::new();
        starts.insert("root", start_ref("s1", None, "agent_run:planner", &empty));
        starts.insert("mid", start_ref("s1", Some("root"), "phase", &empty));
        starts.insert("leaf", start_ref("s1", Some("mid"), "bash", &empty));

        let order = ["root", "mid", "leaf"];
        let mut resolver = AgentResolver::new(&starts, &order);
        assert_eq!(resolver.resolve(Some("leaf"), None), "planner");
    }

    #[test]
    fn end_attrs_override_everything() {
        let empty = Attrs::new();
        let mut starts: HashMap<&str, StartRef<'_>> = HashMap::new();
        starts.insert("t", start_ref("s1", None, "agent_run:planner", &empty));

        let order = ["t"];
        let mut resolver = AgentResolver::new(&starts, &order);
        let end_attrs =
            opentrace_core::testing::attrs(&[("agent", serde_json::json!("overrider"))]);
        assert_eq!(resolver.resolve(Some("t"), Some(&end_attrs)), "overrider");
    }

    #[test]
    fn falls_back_to_session_default_then_unknown() {
        let tagged = opentrace_core::testing::attrs(&[("agent", serde_json::json!("scout"))]);
        let empty = Attrs::new();
        let mut starts: HashMap<&str, StartRef<'_>> = HashMap::new();
        starts.insert("tagged", start_ref("s1", None, "lookup", &tagged));
        starts.insert("plain", start_ref("s1", None, "bash", &empty));
        starts.insert("other", start_ref("s2", None, "bash", &empty));

        let order = ["tagged", "plain", "other"];
        let mut resolver = AgentResolver::new(&starts, &order);
        assert_eq!(resolver.resolve(Some("plain"), None), "scout");
        assert_eq!(resolver.resolve(Some("other"), None), UNKNOWN_AGENT);
        assert_eq!(resolver.resolve(None, None), UNKNOWN_AGENT);
    }

    #[test]
    fn parent_cycles_terminate() {
        let empty = Attrs::new();
        let mut starts: HashMap<&str, StartRef<'_>> = HashMap::new();
        starts.insert("a", start_ref("s1", Some("b"), "x", &empty));
        starts.insert("b", start_ref("s1", Some("a"), "y", &empty));

        let order = ["a", "b"];
        let mut resolver = AgentResolver::new(&starts, &order);
        assert_eq!(resolver.resolve(Some("a"), None), UNKNOWN_AGENT);
    }
}
