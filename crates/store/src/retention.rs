//! Whole-file retention for a project directory.
//!
//! Eviction never compacts: when the `.ndjson` files under a project
//! directory exceed the byte budget, whole inactive files are deleted
//! oldest-mtime-first until the total is back under budget or only active
//! files remain. Files with open writers are never candidates.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Total `.ndjson` bytes found before eviction.
    pub total_bytes: u64,
    pub deleted_files: usize,
    pub deleted_bytes: u64,
}

struct Candidate {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Enforce `max_bytes` over the `.ndjson` files directly under
/// `project_dir`. A budget of zero disables enforcement entirely.
pub fn enforce_project_budget(
    project_dir: &Path,
    max_bytes: u64,
    active: &HashSet<PathBuf>,
) -> std::io::Result<SweepOutcome> {
    let mut outcome = SweepOutcome::default();
    if max_bytes == 0 {
        return Ok(outcome);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(project_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("ndjson") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        outcome.total_bytes += meta.len();
        files.push(Candidate {
            path,
            size: meta.len(),
            modified,
        });
    }

    let mut total = outcome.total_bytes;
    if total <= max_bytes {
        return Ok(outcome);
    }

    let mut deletable: Vec<Candidate> = files
        .into_iter()
        .filter(|file| !active.contains(&file.path))
        .collect();
    deletable.sort_by_key(|file| file.modified);

    for file in deletable {
        if total <= max_bytes {
            break;
        }
        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                total -= file.size;
                outcome.deleted_files += 1;
                outcome.deleted_bytes += file.size;
            }
            Err(error) => {
                tracing::warn!("retention could not delete {}: {error}", file.path.display());
            }
        }
    }

    Ok(outcome)
}
