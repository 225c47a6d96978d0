//! Single-file NDJSON append writer.
//!
//! One spawned task owns the file handle and drains a command channel, so a
//! given file never receives interleaved partial lines no matter how many
//! callers write concurrently. The file is opened lazily on the first
//! append (creating parent directories), and a failed append poisons the
//! stream: the error is surfaced to the caller that hit it and to every
//! later `write`/`flush`/`close`.

use crate::StoreError;
use opentrace_core::TraceRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

enum Command {
    Append {
        line: String,
        ack: oneshot::Sender<Result<(), StoreError>>,
    },
    Flush {
        ack: oneshot::Sender<Result<(), StoreError>>,
    },
    Close {
        ack: oneshot::Sender<Result<(), StoreError>>,
    },
}

#[derive(Clone)]
pub struct NdjsonWriter {
    path: Arc<PathBuf>,
    tx: mpsc::UnboundedSender<Command>,
}

impl NdjsonWriter {
    /// Spawn the writer actor. Requires a tokio runtime.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), rx));
        Self {
            path: Arc::new(path),
            tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Resolves once the line has been handed to the OS.
    pub async fn write(&self, record: &TraceRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Append { line, ack })
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Wait for every queued append to settle.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush { ack })
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Flush then release the file handle. Idempotent.
    pub async fn close(&self) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Close { ack }).is_err() {
            return Ok(());
        }
        match done.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut stream: Option<File> = None;
    let mut poisoned: Option<String> = None;

    while let Some(command) = rx.recv().await {
        match command {
            Command::Append { line, ack } => {
                let result = match &poisoned {
                    Some(reason) => Err(StoreError::WriterFailed(reason.clone())),
                    None => append_line(&path, &mut stream, &line).await,
                };
                if let Err(error) = &result {
                    if poisoned.is_none() {
                        tracing::error!("append to {} failed: {error}", path.display());
                        poisoned = Some(error.to_string());
                    }
                }
                let _ = ack.send(result);
            }
            Command::Flush { ack } => {
                let result = match (&poisoned, stream.as_mut()) {
                    (Some(reason), _) => Err(StoreError::WriterFailed(reason.clone())),
                    (None, Some(file)) => file.flush().await.map_err(StoreError::from),
                    (None, None) => Ok(()),
                };
                let _ = ack.send(result);
            }
            Command::Close { ack } => {
                let result = match (&poisoned, stream.as_mut()) {
                    (Some(reason), _) => Err(StoreError::WriterFailed(reason.clone())),
                    (None, Some(file)) => file.flush().await.map_err(StoreError::from),
                    (None, None) => Ok(()),
                };
                stream = None;
                let _ = ack.send(result);
                break;
            }
        }
    }
    drop(stream);
}

async fn append_line(
    path: &Path,
    stream: &mut Option<File>,
    line: &str,
) -> Result<(), StoreError> {
    if stream.is_none() {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        *stream = Some(file);
    }
    let Some(file) = stream.as_mut() else {
        return Err(StoreError::WriterClosed);
    };
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentrace_core::testing::{task_end, task_start};
    use opentrace_core::{TaskKind, TaskStatus};

    #[tokio::test]
    async fn writes_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.ndjson");
        let writer = NdjsonWriter::new(&path);

        writer
            .write(&task_start(1000, "t1", "s1", TaskKind::Tool, "bash"))
            .await
            .unwrap();
        writer
            .write(&task_end(1500, "t1", "s1", TaskStatus::Ok))
            .await
            .unwrap();
        writer.close().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            opentrace_core::validate::parse_line(line).unwrap();
        }
    }

    #[tokio::test]
    async fn creates_parent_directories_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/trace.ndjson");
        let writer = NdjsonWriter::new(&path);
        assert!(!path.exists());

        writer
            .write(&task_start(1, "t1", "s1", TaskKind::Manual, "phase"))
            .await
            .unwrap();
        writer.flush().await.unwrap();
        assert!(path.exists());
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_never_interleave_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.ndjson");
        let writer = NdjsonWriter::new(&path);

        let mut handles = Vec::new();
        for i in 0..32i64 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("task-{i}");
                writer
                    .write(&task_start(i, &id, "s1", TaskKind::Tool, "grep"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        writer.close().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut seen = 0;
        for line in text.lines() {
            opentrace_core::validate::parse_line(line).unwrap();
            seen += 1;
        }
        assert_eq!(seen, 32);
    }

    #[tokio::test]
    async fn write_after_close_errors() {
        let dir = tempfile::tempdir().unwrap();
        let writer = NdjsonWriter::new(dir.path().join("trace.ndjson"));
        writer.close().await.unwrap();

        let result = writer
            .write(&task_start(1, "t1", "s1", TaskKind::Tool, "bash"))
            .await;
        assert!(matches!(result, Err(StoreError::WriterClosed)));
        // A second close is a no-op.
        writer.close().await.unwrap();
    }
}
