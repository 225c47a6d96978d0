//! Capture configuration.

use opentrace_core::Attrs;
use opentrace_store::paths::default_root_dir;
use std::path::PathBuf;

pub const PROJECT_ENV: &str = "OPENTRACE_PROJECT_ID";
pub const MAX_PROJECT_BYTES_ENV: &str = "OPENTRACE_MAX_PROJECT_BYTES";

const DEFAULT_MAX_PROJECT_BYTES: u64 = 1024 * 1024 * 1024;
const DEFAULT_USER_MESSAGE_PREVIEW_MAX: usize = 280;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Trace root for the sharded writer. `None` → `$OPENTRACE_ROOT` or
    /// `~/.opentrace`.
    pub root_dir: Option<PathBuf>,
    /// `None` → `$OPENTRACE_PROJECT_ID` or the working directory basename.
    pub project_id: Option<String>,
    /// Set to write one flat file instead of per-root-session shards.
    pub out_path: Option<PathBuf>,
    /// Retention budget in bytes; `None` → env or 1 GiB; zero disables.
    pub max_project_bytes: Option<u64>,
    pub capture_user_messages: bool,
    pub user_message_preview_max: usize,
    /// Extra attributes stamped onto the `capture_start` record.
    pub attrs: Attrs,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            project_id: None,
            out_path: None,
            max_project_bytes: None,
            capture_user_messages: true,
            user_message_preview_max: DEFAULT_USER_MESSAGE_PREVIEW_MAX,
            attrs: Attrs::new(),
        }
    }
}

impl CaptureConfig {
    pub(crate) fn resolved_root_dir(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(default_root_dir)
    }

    pub(crate) fn resolved_project_id(&self) -> String {
        if let Some(project_id) = &self.project_id {
            return project_id.clone();
        }
        if let Ok(from_env) = std::env::var(PROJECT_ENV) {
            if !from_env.trim().is_empty() {
                return from_env.trim().to_string();
            }
        }
        std::env::current_dir()
            .ok()
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub(crate) fn resolved_max_project_bytes(&self) -> u64 {
        if let Some(explicit) = self.max_project_bytes {
            return explicit;
        }
        std::env::var(MAX_PROJECT_BYTES_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_PROJECT_BYTES)
    }
}
