//! Session-sharded trace writer with a retention budget.
//!
//! Every non-capture record lands in
//! `<root>/<project>/<rootSessionId>.ndjson`; capture brackets go to a fixed
//! `_capture.ndjson`. Sharding keeps both reconstruction (open only the
//! roots you want) and retention (evict whole files) cheap.
//!
//! Retention runs on a detached sweeper task fed fire-and-forget requests
//! after each write, serialized by the sweeper's own queue. Sweeper
//! failures are logged and swallowed; they never reach callers.

use crate::paths::{project_dir, safe_name};
use crate::retention::enforce_project_budget;
use crate::writer::NdjsonWriter;
use crate::StoreError;
use opentrace_core::TraceRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

const CAPTURE_FILE: &str = "_capture.ndjson";

#[derive(Default)]
struct Shards {
    by_root: HashMap<String, NdjsonWriter>,
    capture: Option<NdjsonWriter>,
}

struct Inner {
    project_dir: PathBuf,
    max_project_bytes: u64,
    shards: Mutex<Shards>,
    active_paths: Mutex<HashSet<PathBuf>>,
    sweep_tx: mpsc::UnboundedSender<()>,
}

#[derive(Clone)]
pub struct SessionShardWriter {
    inner: Arc<Inner>,
}

impl SessionShardWriter {
    /// `max_project_bytes == 0` disables retention.
    pub fn new(root_dir: &Path, project_id: &str, max_project_bytes: u64) -> Self {
        let (sweep_tx, sweep_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            project_dir: project_dir(root_dir, project_id),
            max_project_bytes,
            shards: Mutex::new(Shards::default()),
            active_paths: Mutex::new(HashSet::new()),
            sweep_tx,
        });
        tokio::spawn(run_sweeper(Arc::downgrade(&inner), sweep_rx));
        Self { inner }
    }

    pub fn project_dir(&self) -> &Path {
        &self.inner.project_dir
    }

    /// Route and append one record. Records that require a routing key but
    /// carry none are dropped with a diagnostic, not persisted, not an error.
    pub async fn write(&self, record: &TraceRecord) -> Result<(), StoreError> {
        let writer = if record.is_capture_bracket() {
            self.capture_writer()
        } else {
            match record.root_session_id().filter(|root| !root.is_empty()) {
                Some(root) => self.root_writer(root),
                None => {
                    tracing::error!(
                        record_type = record.type_name(),
                        session_id = record.session_id().unwrap_or(""),
                        "drop record without rootSessionId"
                    );
                    return Ok(());
                }
            }
        };

        writer.write(record).await?;
        if self.inner.max_project_bytes > 0 {
            let _ = self.inner.sweep_tx.send(());
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        for writer in self.all_writers() {
            writer.flush().await?;
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        for writer in self.all_writers() {
            writer.close().await?;
        }
        Ok(())
    }

    fn root_writer(&self, root_session_id: &str) -> NdjsonWriter {
        let key = safe_name(root_session_id);
        let mut shards = self.inner.shards.lock().expect("shard map poisoned");
        if let Some(existing) = shards.by_root.get(&key) {
            return existing.clone();
        }
        let path = self.inner.project_dir.join(format!("{key}.ndjson"));
        let writer = NdjsonWriter::new(&path);
        self.mark_active(path);
        shards.by_root.insert(key, writer.clone());
        writer
    }

    fn capture_writer(&self) -> NdjsonWriter {
        let mut shards = self.inner.shards.lock().expect("shard map poisoned");
        if let Some(existing) = &shards.capture {
            return existing.clone();
        }
        let path = self.inner.project_dir.join(CAPTURE_FILE);
        let writer = NdjsonWriter::new(&path);
        self.mark_active(path);
        shards.capture = Some(writer.clone());
        writer
    }

    fn mark_active(&self, path: PathBuf) {
        self.inner
            .active_paths
            .lock()
            .expect("active set poisoned")
            .insert(path);
    }

    fn all_writers(&self) -> Vec<NdjsonWriter> {
        let shards = self.inner.shards.lock().expect("shard map poisoned");
        let mut writers: Vec<NdjsonWriter> = shards.by_root.values().cloned().collect();
        writers.extend(shards.capture.clone());
        writers
    }
}

/// Drains sweep requests one at a time; exits when every writer handle is
/// gone. Coalescing happens naturally: requests queued behind a running
/// sweep each trigger at most one more pass over an already-trimmed dir.
async fn run_sweeper(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        let Some(inner) = inner.upgrade() else { break };
        let active = inner
            .active_paths
            .lock()
            .expect("active set poisoned")
            .clone();
        let project_dir = inner.project_dir.clone();
        let max_bytes = inner.max_project_bytes;
        let result = tokio::task::spawn_blocking(move || {
            enforce_project_budget(&project_dir, max_bytes, &active)
        })
        .await;
        match result {
            Ok(Ok(outcome)) if outcome.deleted_files > 0 => {
                tracing::debug!(
                    deleted_files = outcome.deleted_files,
                    deleted_bytes = outcome.deleted_bytes,
                    "retention sweep evicted idle root sessions"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                tracing::warn!("retention sweep failed: {error}");
            }
            Err(join_error) => {
                tracing::warn!("retention sweep panicked: {join_error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentrace_core::testing::{task_end, task_start};
    use opentrace_core::{Attrs, TaskKind, TaskStatus};

    fn with_root(record: TraceRecord, root: &str) -> TraceRecord {
        match record {
            TraceRecord::TaskStart {
                ts,
                task_id,
                session_id,
                parent_task_id,
                kind,
                name,
                attrs,
                ..
            } => TraceRecord::TaskStart {
                ts,
                task_id,
                session_id,
                root_session_id: root.to_string(),
                parent_task_id,
                kind,
                name,
                attrs,
            },
            other => other,
        }
    }

    #[tokio::test]
    async fn routes_records_by_root_session() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionShardWriter::new(dir.path(), "proj", 0);

        let a = with_root(task_start(1, "t1", "s1", TaskKind::Tool, "bash"), "root-a");
        let b = with_root(task_start(2, "t2", "s2", TaskKind::Tool, "grep"), "root-b");
        writer.write(&a).await.unwrap();
        writer.write(&b).await.unwrap();
        writer
            .write(&TraceRecord::CaptureStart {
                capture_id: "c1".to_string(),
                ts: 0,
                attrs: Attrs::new(),
            })
            .await
            .unwrap();
        writer.close().await.unwrap();

        let project = dir.path().join("proj");
        assert!(project.join("root-a.ndjson").exists());
        assert!(project.join("root-b.ndjson").exists());
        assert!(project.join("_capture.ndjson").exists());

        let text = std::fs::read_to_string(project.join("root-a.ndjson")).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"taskId\":\"t1\""));
    }

    #[tokio::test]
    async fn same_root_appends_to_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionShardWriter::new(dir.path(), "proj", 0);

        writer
            .write(&task_start(1, "t1", "r1", TaskKind::Tool, "bash"))
            .await
            .unwrap();
        writer
            .write(&task_end(5, "t1", "r1", TaskStatus::Ok))
            .await
            .unwrap();
        writer.close().await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("proj/r1.ndjson")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn drops_records_with_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionShardWriter::new(dir.path(), "proj", 0);

        let record = with_root(task_start(1, "t1", "s1", TaskKind::Tool, "bash"), "");
        writer.write(&record).await.unwrap();
        writer.close().await.unwrap();

        // Nothing persisted; the project dir was never even created.
        let entries = std::fs::read_dir(dir.path().join("proj"))
            .map(|iter| iter.count())
            .unwrap_or(0);
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn sanitizes_root_session_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SessionShardWriter::new(dir.path(), "proj", 0);

        let record = with_root(
            task_start(1, "t1", "s1", TaskKind::Tool, "bash"),
            "ses/../evil",
        );
        writer.write(&record).await.unwrap();
        writer.close().await.unwrap();

        assert!(dir.path().join("proj/ses_.._evil.ndjson").exists());
    }
}
