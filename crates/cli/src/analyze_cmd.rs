use anyhow::{Context, Result};
use opentrace_core::now_ms;
use opentrace_store::load_trace_file;
use opentrace_timeline::summarize;
use std::path::Path;

pub fn run_analyze(file: &Path, summary_out: Option<&Path>) -> Result<()> {
    let load = load_trace_file(file)
        .with_context(|| format!("cannot read trace file {}", file.display()))?;
    if load.malformed_lines > 0 {
        tracing::warn!("{} malformed lines skipped", load.malformed_lines);
    }

    let summary = summarize(&load.records, now_ms());
    let text = serde_json::to_string_pretty(&summary)?;
    if let Some(path) = summary_out {
        std::fs::write(path, &text)
            .with_context(|| format!("cannot write summary to {}", path.display()))?;
    }
    println!("{text}");
    Ok(())
}
