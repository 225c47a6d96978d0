//! The capture session: one context object owning all write-side mutable
//! state — writer, task stacks, part-task tracker, session registry, and
//! agent-run bookkeeping. Created at host init, passed to every handler,
//! torn down by `shutdown`.

use crate::config::CaptureConfig;
use crate::events::{
    AssistantTurnEvent, MessagePartEvent, PartToolStatus, SessionLifecycle, SessionUpdate,
    ToolEndEvent, ToolStartEvent, UserMessageEvent,
};
use crate::parts::{Commit, EndRequest, PartTaskTracker};
use crate::preview::{flatten_whitespace, preview, redact_secrets, truncate, DEFAULT_PREVIEW_MAX};
use crate::registry::{SessionMeta, SessionRegistry};
use crate::task_context::{TaskContext, TaskFrame};
use opentrace_core::ids::new_id;
use opentrace_core::{now_ms, Attrs, SessionOp, TaskKind, TaskStatus, TraceLevel, TraceRecord};
use opentrace_store::{NdjsonWriter, SessionShardWriter, StoreError, TraceWriter};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Tools whose message parts count as coding rather than generic tool use.
const CODING_TOOLS: &[&str] = &["bash", "edit", "write", "multi_edit", "patch"];

/// Marker label written when a session is torn down.
pub const SESSION_COMPLETED: &str = "session.completed";

#[derive(Default)]
struct AgentRuns {
    agent_by_session: HashMap<String, String>,
    run_task_by_session: HashMap<String, String>,
}

struct Inner {
    writer: TraceWriter,
    capture_id: String,
    capture_user_messages: bool,
    user_message_preview_max: usize,
    tasks: Mutex<TaskContext>,
    parts: Mutex<PartTaskTracker>,
    registry: Mutex<SessionRegistry>,
    agents: Mutex<AgentRuns>,
}

#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<Inner>,
}

impl CaptureSession {
    /// Open the writer and bracket the log with `capture_start`.
    pub async fn start(config: CaptureConfig) -> Result<Self, StoreError> {
        let root_dir = config.resolved_root_dir();
        let project_id = config.resolved_project_id();
        let max_project_bytes = config.resolved_max_project_bytes();

        let (writer, out_desc) = match &config.out_path {
            Some(path) => (
                TraceWriter::Single(NdjsonWriter::new(path)),
                path.display().to_string(),
            ),
            None => (
                TraceWriter::Sharded(SessionShardWriter::new(
                    &root_dir,
                    &project_id,
                    max_project_bytes,
                )),
                format!("{}/{}/*.ndjson", root_dir.display(), project_id),
            ),
        };

        let capture_id = new_id();
        let mut attrs = Attrs::new();
        attrs.insert("rootDir".to_string(), json!(root_dir.display().to_string()));
        attrs.insert("projectId".to_string(), json!(project_id));
        attrs.insert("outPath".to_string(), json!(out_desc));
        attrs.insert("maxProjectBytes".to_string(), json!(max_project_bytes));
        attrs.insert(
            "captureUserMessages".to_string(),
            json!(config.capture_user_messages),
        );
        attrs.insert(
            "userMessagePreviewMax".to_string(),
            json!(config.user_message_preview_max),
        );
        attrs.extend(config.attrs.clone());

        writer
            .write(&TraceRecord::CaptureStart {
                capture_id: capture_id.clone(),
                ts: now_ms(),
                attrs,
            })
            .await?;

        Ok(Self {
            inner: Arc::new(Inner {
                writer,
                capture_id,
                capture_user_messages: config.capture_user_messages,
                user_message_preview_max: config.user_message_preview_max,
                tasks: Mutex::new(TaskContext::new()),
                parts: Mutex::new(PartTaskTracker::new()),
                registry: Mutex::new(SessionRegistry::new()),
                agents: Mutex::new(AgentRuns::default()),
            }),
        })
    }

    /// Force-close lingering part tasks with `unknown`, write the
    /// `capture_end` bracket, flush and release the writer.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let closeable = self.lock_parts().drain_running();
        for (session_id, task_id, attrs) in closeable {
            self.end_task_record(&session_id, &task_id, TaskStatus::Unknown, attrs, None)
                .await?;
        }
        self.inner
            .writer
            .write(&TraceRecord::CaptureEnd {
                capture_id: self.inner.capture_id.clone(),
                ts: now_ms(),
            })
            .await?;
        self.inner.writer.flush().await?;
        self.inner.writer.close().await
    }

    // ── host hooks ──────────────────────────────────────────────────────

    /// Raw tool invocation began (`kind=tool`, task id = host call id).
    pub async fn on_tool_start(&self, ev: ToolStartEvent) -> Result<(), StoreError> {
        let ts = ev.ts.unwrap_or_else(now_ms);
        self.ensure_session(&ev.session_id, Some(ts)).await?;
        let Some(root) = self.root_for(&ev.session_id) else {
            tracing::error!(tool = %ev.tool_name, "drop tool start without rootSessionId");
            return Ok(());
        };

        let task_id = ev.call_id.clone().unwrap_or_else(new_id);
        let parent_task_id = self
            .lock_tasks()
            .current(&ev.session_id)
            .map(|frame| frame.task_id.clone());

        let is_skill = ev.tool_name == "skill";
        let skill_name = ev
            .input
            .as_ref()
            .and_then(|input| input.get("name"))
            .and_then(|name| name.as_str())
            .map(ToString::to_string);

        let mut attrs = Attrs::new();
        attrs.insert("toolName".to_string(), json!(ev.tool_name.clone()));
        if let Some(input) = &ev.input {
            attrs.insert(
                "inputPreview".to_string(),
                json!(preview(input, DEFAULT_PREVIEW_MAX)),
            );
        }
        if is_skill {
            attrs.insert("skill".to_string(), json!({ "name": skill_name.clone() }));
        }
        attrs.extend(ev.attrs);

        let (kind, name) = if is_skill {
            (
                TaskKind::Skill,
                format!("skill:{}", skill_name.as_deref().unwrap_or("unknown")),
            )
        } else {
            (TaskKind::Tool, ev.tool_name.clone())
        };

        self.inner
            .writer
            .write(&TraceRecord::TaskStart {
                ts,
                task_id: task_id.clone(),
                session_id: ev.session_id.clone(),
                root_session_id: root,
                parent_task_id,
                kind,
                name,
                attrs,
            })
            .await?;

        self.lock_tasks().push(
            &ev.session_id,
            TaskFrame {
                task_id,
                kind,
                name: ev.tool_name,
                started_at: ts,
            },
        );
        Ok(())
    }

    /// Raw tool invocation finished; pairs by call id, falling back to the
    /// innermost open frame for hosts that don't echo the id back.
    pub async fn on_tool_end(&self, ev: ToolEndEvent) -> Result<(), StoreError> {
        let ts = ev.ts.unwrap_or_else(now_ms);
        self.ensure_session(&ev.session_id, Some(ts)).await?;
        let Some(root) = self.root_for(&ev.session_id) else {
            tracing::error!(tool = %ev.tool_name, "drop tool end without rootSessionId");
            return Ok(());
        };

        let task_id = ev.call_id.clone().or_else(|| {
            self.lock_tasks()
                .current(&ev.session_id)
                .map(|frame| frame.task_id.clone())
        });
        let Some(task_id) = task_id else {
            tracing::warn!(tool = %ev.tool_name, "tool end with no open task");
            return Ok(());
        };
        let frame = self.lock_tasks().pop(&ev.session_id, &task_id);

        let mut attrs = Attrs::new();
        let tool_name = if ev.tool_name.is_empty() {
            frame
                .as_ref()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "unknown-tool".to_string())
        } else {
            ev.tool_name.clone()
        };
        attrs.insert("toolName".to_string(), json!(tool_name));
        if let Some(output) = &ev.output {
            attrs.insert(
                "outputPreview".to_string(),
                json!(preview(output, DEFAULT_PREVIEW_MAX)),
            );
        }
        if let Some(error) = &ev.error {
            attrs.insert(
                "error".to_string(),
                json!(preview(error, DEFAULT_PREVIEW_MAX)),
            );
        }
        attrs.extend(ev.attrs);

        self.inner
            .writer
            .write(&TraceRecord::TaskEnd {
                ts,
                task_id,
                session_id: ev.session_id.clone(),
                root_session_id: root,
                status: if ev.error.is_some() {
                    TaskStatus::Error
                } else {
                    TaskStatus::Ok
                },
                duration_ms: frame.map(|f| (ts - f.started_at).max(0)),
                tokens_in: ev.tokens_in,
                tokens_out: ev.tokens_out,
                attrs,
            })
            .await
    }

    pub async fn on_session_event(&self, ev: SessionLifecycle) -> Result<(), StoreError> {
        match ev {
            SessionLifecycle::Created(update) => {
                let meta = self.upsert_and_emit(&update).await?;
                let attrs = session_event_attrs(&update, &meta);
                self.emit_tracepoint(
                    &update.session_id,
                    "agent.session.created",
                    TraceLevel::Info,
                    attrs,
                    update.ts,
                )
                .await?;
            }
            SessionLifecycle::Updated(update) => {
                let meta = self.upsert_and_emit(&update).await?;
                let attrs = session_event_attrs(&update, &meta);
                self.emit_tracepoint(
                    &update.session_id,
                    "agent.session.updated",
                    TraceLevel::Info,
                    attrs,
                    update.ts,
                )
                .await?;
            }
            SessionLifecycle::Idle { session_id, ts } => {
                self.ensure_session(&session_id, ts).await?;
                self.close_dangling_parts(&session_id, TaskStatus::Unknown, ts)
                    .await?;
                self.finish_agent_run(&session_id, TaskStatus::Ok, ts).await?;
            }
            SessionLifecycle::Deleted { session_id, ts } => {
                self.ensure_session(&session_id, ts).await?;
                self.close_dangling_parts(&session_id, TaskStatus::Unknown, ts)
                    .await?;
                self.finish_agent_run(&session_id, TaskStatus::Ok, ts).await?;
                self.emit_marker(&session_id, SESSION_COMPLETED, ts).await?;
                self.lock_tasks().clear(&session_id);
            }
            SessionLifecycle::Error { session_id, ts } => {
                self.ensure_session(&session_id, ts).await?;
                self.close_dangling_parts(&session_id, TaskStatus::Error, ts)
                    .await?;
                self.finish_agent_run(&session_id, TaskStatus::Error, ts)
                    .await?;
            }
        }
        Ok(())
    }

    /// Streaming message-part updates drive the part-task machine.
    pub async fn on_message_part(&self, ev: MessagePartEvent) -> Result<(), StoreError> {
        match ev {
            MessagePartEvent::Reasoning {
                session_id,
                part_id,
                start_ts,
                end_ts,
            } => {
                self.ensure_session(&session_id, start_ts).await?;
                let key = format!("reasoning:{part_id}");
                let attrs = self.part_attrs(&session_id, "reasoning", None, None);
                self.start_part(&key, &session_id, "activity:reasoning", attrs, start_ts)
                    .await?;
                if end_ts.is_some() {
                    self.end_part(&key, TaskStatus::Ok, end_ts).await?;
                }
            }
            MessagePartEvent::Tool {
                session_id,
                call_id,
                tool_name,
                status,
                start_ts,
                end_ts,
            } => {
                self.ensure_session(&session_id, start_ts).await?;
                let activity = if CODING_TOOLS.contains(&tool_name.as_str()) {
                    "coding"
                } else {
                    "tool"
                };
                let key = format!("tool:{call_id}");
                let name = format!("activity:{activity}:{tool_name}");
                let attrs = self.part_attrs(
                    &session_id,
                    activity,
                    Some(tool_name.as_str()),
                    Some(call_id.as_str()),
                );

                match status {
                    PartToolStatus::Running => {
                        self.start_part(&key, &session_id, &name, attrs, start_ts)
                            .await?;
                    }
                    PartToolStatus::Completed | PartToolStatus::Error => {
                        // A completed part may be the first signal we see.
                        if !self.lock_parts().contains(&key) && start_ts.is_some() {
                            self.start_part(&key, &session_id, &name, attrs, start_ts)
                                .await?;
                        }
                        let close = if status == PartToolStatus::Error {
                            TaskStatus::Error
                        } else {
                            TaskStatus::Ok
                        };
                        self.end_part(&key, close, end_ts).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Opens the session's `agent_run:<agent>` task on the first assistant
    /// turn; later turns for the same session are no-ops.
    pub async fn on_assistant_turn(&self, ev: AssistantTurnEvent) -> Result<(), StoreError> {
        self.ensure_session(&ev.session_id, ev.ts).await?;
        {
            let mut agents = self.lock_agents();
            if agents.agent_by_session.contains_key(&ev.session_id) {
                return Ok(());
            }
            agents
                .agent_by_session
                .insert(ev.session_id.clone(), ev.agent.clone());
        }

        let mut attrs = Attrs::new();
        attrs.insert("activity".to_string(), json!("agent_run"));
        attrs.insert("agent".to_string(), json!(ev.agent.clone()));
        if let Some(title) = self.session_title(&ev.session_id) {
            attrs.insert("sessionTitle".to_string(), json!(title));
        }

        let task_id = self
            .start_task_record(
                &ev.session_id,
                &format!("agent_run:{}", ev.agent),
                TaskKind::Manual,
                attrs.clone(),
                ev.ts,
            )
            .await?;
        if let Some(task_id) = task_id {
            self.lock_agents()
                .run_task_by_session
                .insert(ev.session_id.clone(), task_id);
        }
        self.emit_tracepoint(
            &ev.session_id,
            "agent.run.start",
            TraceLevel::Info,
            attrs,
            ev.ts,
        )
        .await?;
        Ok(())
    }

    pub async fn on_user_message(&self, ev: UserMessageEvent) -> Result<(), StoreError> {
        self.ensure_session(&ev.session_id, ev.ts).await?;
        let max = self.inner.user_message_preview_max;
        if !self.inner.capture_user_messages || max == 0 {
            return Ok(());
        }

        let mut attrs = Attrs::new();
        attrs.insert("role".to_string(), json!("user"));
        if let Some(message_id) = &ev.message_id {
            attrs.insert("messageId".to_string(), json!(message_id));
        }
        if let Some(text) = &ev.text {
            let flat = flatten_whitespace(text);
            attrs.insert(
                "preview".to_string(),
                json!(truncate(&redact_secrets(&flat), max)),
            );
        }
        if let Some(title) = self.session_title(&ev.session_id) {
            attrs.insert("sessionTitle".to_string(), json!(title));
        }
        self.emit_tracepoint(&ev.session_id, "user.message", TraceLevel::Info, attrs, ev.ts)
            .await?;
        Ok(())
    }

    // ── manual trace surface ────────────────────────────────────────────

    pub async fn emit_session_upsert(&self, update: SessionUpdate) -> Result<(), StoreError> {
        self.upsert_and_emit(&update).await.map(|_| ())
    }

    /// Point-in-time annotation parented to the innermost open task.
    /// Returns the tracepoint id, or `None` if the record was dropped.
    pub async fn emit_tracepoint(
        &self,
        session_id: &str,
        name: &str,
        level: TraceLevel,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<Option<String>, StoreError> {
        self.ensure_session(session_id, ts).await?;
        let Some(root) = self.root_for(session_id) else {
            tracing::error!(name, "drop tracepoint without rootSessionId");
            return Ok(None);
        };
        let tp_id = new_id();
        let parent_task_id = self
            .lock_tasks()
            .current(session_id)
            .map(|frame| frame.task_id.clone());
        self.inner
            .writer
            .write(&TraceRecord::Tracepoint {
                ts: ts.unwrap_or_else(now_ms),
                tp_id: tp_id.clone(),
                session_id: session_id.to_string(),
                root_session_id: root,
                parent_task_id,
                name: name.to_string(),
                level,
                attrs,
                links: Vec::new(),
            })
            .await?;
        Ok(Some(tp_id))
    }

    pub async fn emit_counter(
        &self,
        session_id: &str,
        name: &str,
        value: f64,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<(), StoreError> {
        self.ensure_session(session_id, ts).await?;
        let Some(root) = self.root_for(session_id) else {
            tracing::error!(name, "drop counter without rootSessionId");
            return Ok(());
        };
        self.inner
            .writer
            .write(&TraceRecord::Counter {
                ts: ts.unwrap_or_else(now_ms),
                name: name.to_string(),
                session_id: session_id.to_string(),
                root_session_id: root,
                value,
                attrs,
            })
            .await
    }

    /// Open a manual task (phase tracking). Returns its task id, or `None`
    /// if the record was dropped.
    pub async fn start_manual_task(
        &self,
        session_id: &str,
        name: &str,
        kind: TaskKind,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<Option<String>, StoreError> {
        self.ensure_session(session_id, ts).await?;
        self.start_task_record(session_id, name, kind, attrs, ts)
            .await
    }

    /// Close a manual task by id, defaulting to the innermost open frame.
    pub async fn end_manual_task(
        &self,
        session_id: &str,
        task_id: Option<&str>,
        status: TaskStatus,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<Option<String>, StoreError> {
        self.ensure_session(session_id, ts).await?;
        let task_id = task_id.map(ToString::to_string).or_else(|| {
            self.lock_tasks()
                .current(session_id)
                .map(|frame| frame.task_id.clone())
        });
        let Some(task_id) = task_id else {
            tracing::warn!(session_id, "manual task end with no open task");
            return Ok(None);
        };
        self.end_task_record(session_id, &task_id, status, attrs, ts)
            .await?;
        Ok(Some(task_id))
    }

    // ── internals ───────────────────────────────────────────────────────

    async fn start_part(
        &self,
        key: &str,
        session_id: &str,
        name: &str,
        attrs: Attrs,
        start_ts: Option<i64>,
    ) -> Result<(), StoreError> {
        if !self.lock_parts().begin(key, session_id, attrs.clone()) {
            return Ok(());
        }
        let task_id = self
            .start_task_record(session_id, name, TaskKind::Manual, attrs, start_ts)
            .await?;
        let outcome = self.lock_parts().commit(key, task_id);
        if let Commit::CloseNow {
            session_id,
            task_id,
            status,
            end_ts,
            attrs,
        } = outcome
        {
            self.end_task_record(&session_id, &task_id, status, attrs, end_ts)
                .await?;
        }
        Ok(())
    }

    async fn end_part(
        &self,
        key: &str,
        status: TaskStatus,
        end_ts: Option<i64>,
    ) -> Result<(), StoreError> {
        let outcome = self.lock_parts().request_end(key, status, end_ts);
        if let EndRequest::CloseNow {
            session_id,
            task_id,
            attrs,
        } = outcome
        {
            self.end_task_record(&session_id, &task_id, status, attrs, end_ts)
                .await?;
        }
        Ok(())
    }

    async fn close_dangling_parts(
        &self,
        session_id: &str,
        status: TaskStatus,
        ts: Option<i64>,
    ) -> Result<(), StoreError> {
        let keys = self.lock_parts().keys_for_session(session_id);
        for key in keys {
            self.end_part(&key, status, ts).await?;
        }
        Ok(())
    }

    async fn finish_agent_run(
        &self,
        session_id: &str,
        status: TaskStatus,
        ts: Option<i64>,
    ) -> Result<(), StoreError> {
        let (run_task, agent) = {
            let mut agents = self.lock_agents();
            (
                agents.run_task_by_session.remove(session_id),
                agents.agent_by_session.remove(session_id),
            )
        };
        if run_task.is_none() && agent.is_none() {
            return Ok(());
        }

        let mut attrs = Attrs::new();
        attrs.insert("activity".to_string(), json!("agent_run"));
        if let Some(agent) = &agent {
            attrs.insert("agent".to_string(), json!(agent));
        }
        if let Some(title) = self.session_title(session_id) {
            attrs.insert("sessionTitle".to_string(), json!(title));
        }

        if let Some(task_id) = run_task {
            self.end_task_record(session_id, &task_id, status, attrs.clone(), ts)
                .await?;
        }
        self.emit_tracepoint(session_id, "agent.run.end", TraceLevel::Info, attrs, ts)
            .await?;
        Ok(())
    }

    async fn start_task_record(
        &self,
        session_id: &str,
        name: &str,
        kind: TaskKind,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<Option<String>, StoreError> {
        let Some(root) = self.root_for(session_id) else {
            tracing::error!(name, "drop task_start without rootSessionId");
            return Ok(None);
        };
        let ts = ts.unwrap_or_else(now_ms);
        let task_id = new_id();
        let parent_task_id = self
            .lock_tasks()
            .current(session_id)
            .map(|frame| frame.task_id.clone());

        self.inner
            .writer
            .write(&TraceRecord::TaskStart {
                ts,
                task_id: task_id.clone(),
                session_id: session_id.to_string(),
                root_session_id: root,
                parent_task_id,
                kind,
                name: name.to_string(),
                attrs,
            })
            .await?;

        self.lock_tasks().push(
            session_id,
            TaskFrame {
                task_id: task_id.clone(),
                kind,
                name: name.to_string(),
                started_at: ts,
            },
        );
        Ok(Some(task_id))
    }

    async fn end_task_record(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        attrs: Attrs,
        ts: Option<i64>,
    ) -> Result<(), StoreError> {
        let Some(root) = self.root_for(session_id) else {
            tracing::error!(task_id, "drop task_end without rootSessionId");
            return Ok(());
        };
        let ts = ts.unwrap_or_else(now_ms);
        let frame = self.lock_tasks().pop(session_id, task_id);
        self.inner
            .writer
            .write(&TraceRecord::TaskEnd {
                ts,
                task_id: task_id.to_string(),
                session_id: session_id.to_string(),
                root_session_id: root,
                status,
                duration_ms: frame.map(|f| (ts - f.started_at).max(0)),
                tokens_in: None,
                tokens_out: None,
                attrs,
            })
            .await
    }

    async fn upsert_and_emit(&self, update: &SessionUpdate) -> Result<SessionMeta, StoreError> {
        let meta = self.lock_registry().upsert(
            &update.session_id,
            update.parent_session_id.as_deref(),
            update.title.as_deref(),
        );
        let mut attrs = Attrs::new();
        if let Some(title) = &meta.title {
            attrs.insert("sessionTitle".to_string(), json!(title));
        }
        self.inner
            .writer
            .write(&TraceRecord::Session {
                op: SessionOp::Upsert,
                ts: update.ts.unwrap_or_else(now_ms),
                session_id: meta.session_id.clone(),
                root_session_id: meta.root_session_id.clone(),
                parent_session_id: meta.parent_session_id.clone(),
                label: meta.title.clone(),
                attrs,
            })
            .await?;
        Ok(meta)
    }

    async fn ensure_session(&self, session_id: &str, ts: Option<i64>) -> Result<(), StoreError> {
        if self.lock_registry().contains(session_id) {
            return Ok(());
        }
        self.upsert_and_emit(&SessionUpdate {
            ts,
            session_id: session_id.to_string(),
            parent_session_id: None,
            title: None,
        })
        .await?;
        Ok(())
    }

    async fn emit_marker(
        &self,
        session_id: &str,
        label: &str,
        ts: Option<i64>,
    ) -> Result<(), StoreError> {
        let Some(root) = self.root_for(session_id) else {
            tracing::error!(label, "drop marker without rootSessionId");
            return Ok(());
        };
        self.inner
            .writer
            .write(&TraceRecord::Marker {
                ts: ts.unwrap_or_else(now_ms),
                label: label.to_string(),
                session_id: session_id.to_string(),
                root_session_id: root,
                attrs: Attrs::new(),
            })
            .await
    }

    fn part_attrs(
        &self,
        session_id: &str,
        activity: &str,
        tool: Option<&str>,
        call_id: Option<&str>,
    ) -> Attrs {
        let agent = self
            .lock_agents()
            .agent_by_session
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| "unknown-agent".to_string());
        let mut attrs = Attrs::new();
        attrs.insert("activity".to_string(), json!(activity));
        attrs.insert("agent".to_string(), json!(agent));
        if let Some(tool) = tool {
            attrs.insert("tool".to_string(), json!(tool));
        }
        if let Some(call_id) = call_id {
            attrs.insert("callID".to_string(), json!(call_id));
        }
        if let Some(title) = self.session_title(session_id) {
            attrs.insert("sessionTitle".to_string(), json!(title));
        }
        attrs
    }

    fn root_for(&self, session_id: &str) -> Option<String> {
        self.lock_registry()
            .root_of(session_id)
            .map(ToString::to_string)
    }

    fn session_title(&self, session_id: &str) -> Option<String> {
        self.lock_registry()
            .title(session_id)
            .map(ToString::to_string)
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, TaskContext> {
        self.inner.tasks.lock().expect("task context poisoned")
    }

    fn lock_parts(&self) -> std::sync::MutexGuard<'_, PartTaskTracker> {
        self.inner.parts.lock().expect("part tracker poisoned")
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, SessionRegistry> {
        self.inner.registry.lock().expect("session registry poisoned")
    }

    fn lock_agents(&self) -> std::sync::MutexGuard<'_, AgentRuns> {
        self.inner.agents.lock().expect("agent runs poisoned")
    }
}

fn session_event_attrs(update: &SessionUpdate, meta: &SessionMeta) -> Attrs {
    let mut attrs = Attrs::new();
    if let Some(parent) = &update.parent_session_id {
        attrs.insert("parentSessionId".to_string(), json!(parent));
    }
    if let Some(title) = &meta.title {
        attrs.insert("sessionTitle".to_string(), json!(title));
    }
    attrs.insert(
        "rootSessionId".to_string(),
        json!(meta.root_session_id.clone()),
    );
    attrs
}
