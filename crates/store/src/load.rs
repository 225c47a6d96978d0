//! Reading trace logs back: ordered, blank-line tolerant, malformed-line
//! counting.

use crate::StoreError;
use opentrace_core::validate::parse_line;
use opentrace_core::TraceRecord;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Result of loading one or more trace files, in arrival order.
#[derive(Debug, Default)]
pub struct TraceLoad {
    pub records: Vec<TraceRecord>,
    pub malformed_lines: usize,
    pub sources: Vec<PathBuf>,
}

pub fn load_trace_file(path: &Path) -> Result<TraceLoad, StoreError> {
    load_trace_files(std::slice::from_ref(&path.to_path_buf()))
}

/// Load files in the given order; records keep file order within and across
/// files. Unreadable lines are counted, never fatal; an unreadable *file*
/// is the caller's problem and propagates.
pub fn load_trace_files(paths: &[PathBuf]) -> Result<TraceLoad, StoreError> {
    let mut load = TraceLoad::default();

    for path in paths {
        let file = std::fs::File::open(path)?;
        load.sources.push(path.clone());

        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed) {
                Ok(record) => load.records.push(record),
                Err(error) => {
                    load.malformed_lines += 1;
                    tracing::debug!("skip malformed line in {}: {error}", path.display());
                }
            }
        }
    }

    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::NdjsonWriter;
    use opentrace_core::testing::{task_end, task_start};
    use opentrace_core::{TaskKind, TaskStatus};

    #[tokio::test]
    async fn round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.ndjson");
        let writer = NdjsonWriter::new(&path);

        let records = vec![
            task_start(1000, "t1", "s1", TaskKind::Tool, "bash"),
            task_start(1100, "t2", "s1", TaskKind::Manual, "phase"),
            task_end(1500, "t1", "s1", TaskStatus::Ok),
        ];
        for record in &records {
            writer.write(record).await.unwrap();
        }
        writer.close().await.unwrap();

        let load = load_trace_file(&path).unwrap();
        assert_eq!(load.malformed_lines, 0);
        assert_eq!(load.records.len(), 3);
        let ids: Vec<i64> = load.records.iter().map(|r| r.ts()).collect();
        assert_eq!(ids, vec![1000, 1100, 1500]);
    }

    #[test]
    fn counts_malformed_and_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.ndjson");
        std::fs::write(
            &path,
            concat!(
                "{\"type\":\"counter\",\"ts\":1,\"name\":\"n\",\"sessionId\":\"s\",\"rootSessionId\":\"r\",\"value\":1}\n",
                "\n",
                "not json at all\n",
                "{\"type\":\"counter\",\"ts\":2,\"name\":\"n\",\"sessionId\":\"s\",\"value\":2}\n",
                "{\"type\":\"marker\",\"ts\":3,\"label\":\"done\",\"sessionId\":\"s\",\"rootSessionId\":\"r\"}\n",
            ),
        )
        .unwrap();

        let load = load_trace_file(&path).unwrap();
        // Blank line ignored; bad JSON and the counter missing its root both count.
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.malformed_lines, 2);
    }

    #[test]
    fn merges_multiple_files_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ndjson");
        let b = dir.path().join("b.ndjson");
        std::fs::write(
            &a,
            "{\"type\":\"marker\",\"ts\":10,\"label\":\"a\",\"sessionId\":\"s\",\"rootSessionId\":\"ra\"}\n",
        )
        .unwrap();
        std::fs::write(
            &b,
            "{\"type\":\"marker\",\"ts\":5,\"label\":\"b\",\"sessionId\":\"s\",\"rootSessionId\":\"rb\"}\n",
        )
        .unwrap();

        let load = load_trace_files(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(load.sources, vec![a, b]);
        // Arrival order, not timestamp order.
        assert_eq!(load.records[0].ts(), 10);
        assert_eq!(load.records[1].ts(), 5);
    }

    #[test]
    fn missing_file_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.ndjson");
        assert!(load_trace_file(&missing).is_err());
    }
}
