//! Reconciliation of racing start/end signals for sub-task activity.
//!
//! A part (a reasoning phase, a tool call surfaced as a message part)
//! signals start and end asynchronously, and the `task_start` append for the
//! start is itself asynchronous — the close signal can arrive before the
//! open has committed. Each logical key moves through three states:
//!
//! - `pending`: start requested, append not yet committed, no task id.
//! - `running`: append committed, task id known.
//! - `ending`: close requested while still pending; status and end
//!   timestamp are buffered until the open commits.
//!
//! The tracker is pure state — the capture session drives the actual
//! appends around `begin`/`commit`/`request_end` — so the machine can be
//! tested on its own.

use opentrace_core::{Attrs, TaskStatus};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum PartState {
    Pending,
    Running { task_id: String },
    Ending { status: TaskStatus, end_ts: Option<i64> },
}

#[derive(Debug, Clone)]
struct PartEntry {
    session_id: String,
    attrs: Attrs,
    state: PartState,
}

/// What the caller must do after committing a start append.
#[derive(Debug)]
pub enum Commit {
    /// The part is live; nothing to emit.
    Running,
    /// A close raced ahead of the start commit: emit `task_end` now.
    CloseNow {
        session_id: String,
        task_id: String,
        status: TaskStatus,
        end_ts: Option<i64>,
        attrs: Attrs,
    },
    /// The entry vanished (failed append, shutdown); nothing to emit.
    Gone,
}

/// What the caller must do after requesting a close.
#[derive(Debug)]
pub enum EndRequest {
    /// The part was running: emit `task_end` now.
    CloseNow {
        session_id: String,
        task_id: String,
        attrs: Attrs,
    },
    /// Start still in flight; the close is buffered for `commit`.
    Buffered,
    /// No such part.
    Untracked,
}

#[derive(Debug, Default)]
pub struct PartTaskTracker {
    by_key: HashMap<String, PartEntry>,
}

impl PartTaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Register a start request. Returns false if the key is already
    /// tracked in any state — a duplicate start must not open a second task.
    pub fn begin(&mut self, key: &str, session_id: &str, attrs: Attrs) -> bool {
        if self.by_key.contains_key(key) {
            return false;
        }
        self.by_key.insert(
            key.to_string(),
            PartEntry {
                session_id: session_id.to_string(),
                attrs,
                state: PartState::Pending,
            },
        );
        true
    }

    /// Record the outcome of the start append. `task_id == None` means the
    /// append was dropped or failed; the entry is forgotten.
    pub fn commit(&mut self, key: &str, task_id: Option<String>) -> Commit {
        let Some(state) = self.by_key.get(key).map(|entry| entry.state.clone()) else {
            return Commit::Gone;
        };
        let Some(task_id) = task_id else {
            self.by_key.remove(key);
            return Commit::Gone;
        };

        match state {
            PartState::Pending => {
                if let Some(entry) = self.by_key.get_mut(key) {
                    entry.state = PartState::Running { task_id };
                }
                Commit::Running
            }
            PartState::Ending { status, end_ts } => match self.by_key.remove(key) {
                Some(entry) => Commit::CloseNow {
                    session_id: entry.session_id,
                    task_id,
                    status,
                    end_ts,
                    attrs: entry.attrs,
                },
                None => Commit::Gone,
            },
            // Double commit for one key: keep the first task id.
            PartState::Running { .. } => Commit::Running,
        }
    }

    /// Request a close. Merging is by severity rank (`error > unknown >
    /// ok`); the latest end timestamp wins.
    pub fn request_end(&mut self, key: &str, status: TaskStatus, end_ts: Option<i64>) -> EndRequest {
        let Some(state) = self.by_key.get(key).map(|entry| entry.state.clone()) else {
            return EndRequest::Untracked;
        };

        match state {
            PartState::Running { task_id } => match self.by_key.remove(key) {
                Some(entry) => EndRequest::CloseNow {
                    session_id: entry.session_id,
                    task_id,
                    attrs: entry.attrs,
                },
                None => EndRequest::Untracked,
            },
            PartState::Pending => {
                if let Some(entry) = self.by_key.get_mut(key) {
                    entry.state = PartState::Ending { status, end_ts };
                }
                EndRequest::Buffered
            }
            PartState::Ending {
                status: previous,
                end_ts: previous_ts,
            } => {
                if let Some(entry) = self.by_key.get_mut(key) {
                    entry.state = PartState::Ending {
                        status: previous.merge(status),
                        end_ts: end_ts.or(previous_ts),
                    };
                }
                EndRequest::Buffered
            }
        }
    }

    /// Keys tracked for one session, for dangling-task close on teardown.
    pub fn keys_for_session(&self, session_id: &str) -> Vec<String> {
        self.by_key
            .iter()
            .filter(|(_, entry)| entry.session_id == session_id)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove every entry. Running entries come back as closeable
    /// `(session_id, task_id, attrs)`; pending/ending entries have no
    /// committed task and are simply forgotten.
    pub fn drain_running(&mut self) -> Vec<(String, String, Attrs)> {
        let mut closeable = Vec::new();
        for (_, entry) in self.by_key.drain() {
            if let PartState::Running { task_id } = entry.state {
                closeable.push((entry.session_id, task_id, entry.attrs));
            }
        }
        closeable
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
