//! Payload previews for captured tool input/output.
//!
//! Anything captured from the host runtime may contain credentials;
//! previews are compact-serialized, scrubbed against known secret shapes,
//! then truncated.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_PREVIEW_MAX: usize = 800;

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-[a-zA-Z0-9]{20,}",
        r#"(?i)api[_-]?key["']?\s*[:=]\s*["'][^"']+["']"#,
        r#"(?i)authorization["']?\s*[:=]\s*["'][^"']+["']"#,
        r#"(?i)password["']?\s*[:=]\s*["'][^"']+["']"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static secret pattern"))
    .collect()
});

pub fn redact_secrets(raw: &str) -> String {
    let mut result = raw.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").into_owned();
    }
    result
}

/// Compact, scrubbed, truncated preview of a JSON payload.
pub fn preview(value: &serde_json::Value, max: usize) -> String {
    let compact = match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    truncate(&redact_secrets(&compact), max)
}

pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}

/// Collapse whitespace in a user-visible message preview.
pub fn flatten_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
