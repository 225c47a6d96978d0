use anyhow::{Context, Result};
use opentrace_core::now_ms;
use opentrace_store::load_trace_file;
use opentrace_timeline::{export_records, ExportFormat};
use std::path::Path;

pub fn run_export(file: &Path, out: &Path, format: ExportFormat) -> Result<()> {
    let load = load_trace_file(file)
        .with_context(|| format!("cannot read trace file {}", file.display()))?;
    if load.malformed_lines > 0 {
        tracing::warn!("{} malformed lines skipped", load.malformed_lines);
    }

    let rendered = export_records(&load.records, format, now_ms())?;
    std::fs::write(out, rendered)
        .with_context(|| format!("cannot write export to {}", out.display()))?;
    println!(
        "exported {} records to {} ({format})",
        load.records.len(),
        out.display()
    );
    Ok(())
}
