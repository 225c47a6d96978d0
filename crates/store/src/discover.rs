//! Discovery of root-session trace files under a trace root.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Collect root-session `.ndjson` files under `root_dir`, newest first,
/// capped at `limit`. `project` narrows the scan to one project directory;
/// `None` scans all of them. Underscore-prefixed files (the capture stream)
/// are skipped. Filesystem errors degrade to an empty or partial listing —
/// a reader polling a trace root must never fail because a directory
/// vanished mid-scan.
pub fn discover_root_files(root_dir: &Path, project: Option<&str>, limit: usize) -> Vec<PathBuf> {
    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    for project_dir in list_project_dirs(root_dir, project) {
        let Ok(entries) = std::fs::read_dir(&project_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("ndjson") {
                continue;
            }
            if entry
                .file_name()
                .to_str()
                .is_none_or(|name| name.starts_with('_'))
            {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));
    files.truncate(limit);
    files.into_iter().map(|(path, _)| path).collect()
}

fn list_project_dirs(root_dir: &Path, project: Option<&str>) -> Vec<PathBuf> {
    if let Some(project) = project {
        let candidate = root_dir.join(project);
        return if candidate.is_dir() {
            vec![candidate]
        } else {
            Vec::new()
        };
    }
    let Ok(entries) = std::fs::read_dir(root_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, "{}\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    #[test]
    fn finds_newest_root_files_across_projects() {
        let dir = tempfile::tempdir().unwrap();
        let proj_a = dir.path().join("a");
        let proj_b = dir.path().join("b");
        std::fs::create_dir_all(&proj_a).unwrap();
        std::fs::create_dir_all(&proj_b).unwrap();

        touch(&proj_a.join("old.ndjson"));
        touch(&proj_b.join("mid.ndjson"));
        touch(&proj_a.join("new.ndjson"));

        let found = discover_root_files(dir.path(), None, 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].file_name().unwrap(), "new.ndjson");
        assert_eq!(found[1].file_name().unwrap(), "mid.ndjson");
    }

    #[test]
    fn skips_capture_stream_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("p");
        std::fs::create_dir_all(&proj).unwrap();
        touch(&proj.join("_capture.ndjson"));
        touch(&proj.join("notes.txt"));
        touch(&proj.join("root.ndjson"));

        let found = discover_root_files(dir.path(), None, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name().unwrap(), "root.ndjson");
    }

    #[test]
    fn project_filter_narrows_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one", "two"] {
            let proj = dir.path().join(name);
            std::fs::create_dir_all(&proj).unwrap();
            touch(&proj.join("r.ndjson"));
        }

        let found = discover_root_files(dir.path(), Some("one"), 10);
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with(dir.path().join("one")));

        assert!(discover_root_files(dir.path(), Some("absent"), 10).is_empty());
    }

    #[test]
    fn missing_root_dir_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        assert!(discover_root_files(&missing, None, 10).is_empty());
    }
}
