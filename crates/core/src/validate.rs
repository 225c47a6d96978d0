//! Line-level acceptance rules for trace logs.
//!
//! A line is accepted iff it parses as JSON with a recognized `type` and
//! carries the type-specific required fields; every non-capture type must
//! also carry non-empty `sessionId` and `rootSessionId`. Callers count
//! rejected lines as malformed and move on — rejection is never fatal.

use crate::record::TraceRecord;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LineError {
    #[error("unparseable JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty required field `{field}` on {record_type}")]
    EmptyField {
        record_type: &'static str,
        field: &'static str,
    },
}

/// Parse and validate a single log line.
pub fn parse_line(line: &str) -> Result<TraceRecord, LineError> {
    let record: TraceRecord = serde_json::from_str(line)?;
    validate_record(&record)?;
    Ok(record)
}

/// Reject records whose serde-required string fields are present but empty.
pub fn validate_record(record: &TraceRecord) -> Result<(), LineError> {
    let reject = |field: &'static str| LineError::EmptyField {
        record_type: record.type_name(),
        field,
    };

    match record {
        TraceRecord::CaptureStart { capture_id, .. }
        | TraceRecord::CaptureEnd { capture_id, .. } => {
            if capture_id.is_empty() {
                return Err(reject("captureId"));
            }
            return Ok(());
        }
        _ => {}
    }

    if record.session_id().is_none_or(str::is_empty) {
        return Err(reject("sessionId"));
    }
    if record.root_session_id().is_none_or(str::is_empty) {
        return Err(reject("rootSessionId"));
    }

    match record {
        TraceRecord::TaskStart { task_id, name, .. } => {
            if task_id.is_empty() {
                return Err(reject("taskId"));
            }
            if name.is_empty() {
                return Err(reject("name"));
            }
        }
        TraceRecord::TaskEnd { task_id, .. } => {
            if task_id.is_empty() {
                return Err(reject("taskId"));
            }
        }
        TraceRecord::Tracepoint { tp_id, name, .. } => {
            if tp_id.is_empty() {
                return Err(reject("tpId"));
            }
            if name.is_empty() {
                return Err(reject("name"));
            }
        }
        TraceRecord::Counter { name, .. } => {
            if name.is_empty() {
                return Err(reject("name"));
            }
        }
        TraceRecord::Marker { label, .. } => {
            if label.is_empty() {
                return Err(reject("label"));
            }
        }
        _ => {}
    }

    Ok(())
}
