//! Runtime path resolution for trace roots.

use std::path::{Path, PathBuf};

/// Environment override for the trace root directory.
pub const ROOT_ENV: &str = "OPENTRACE_ROOT";

/// Default trace root: `$OPENTRACE_ROOT`, else `~/.opentrace`, else
/// `./.opentrace` when no home directory can be resolved.
pub fn default_root_dir() -> PathBuf {
    if let Ok(root) = std::env::var(ROOT_ENV) {
        let trimmed = root.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".opentrace"),
        None => PathBuf::from(".opentrace"),
    }
}

/// Sanitize an id for use as a file or directory name.
pub fn safe_name(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn project_dir(root_dir: &Path, project_id: &str) -> PathBuf {
    root_dir.join(safe_name(project_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_name_passes_plain_ids() {
        assert_eq!(safe_name("ses_0123abc"), "ses_0123abc");
        assert_eq!(safe_name("my-project.v2"), "my-project.v2");
    }

    #[test]
    fn safe_name_replaces_path_separators() {
        assert_eq!(safe_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(safe_name("../escape"), ".._escape");
    }

    #[test]
    fn project_dir_sanitizes_id() {
        let dir = project_dir(Path::new("/tmp/traces"), "web/app");
        assert_eq!(dir, PathBuf::from("/tmp/traces/web_app"));
    }
}
