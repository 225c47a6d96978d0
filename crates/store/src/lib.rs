pub mod discover;
pub mod load;
pub mod paths;
pub mod retention;
pub mod shard;
pub mod writer;

mod error;

pub use error::StoreError;
pub use load::{load_trace_file, load_trace_files, TraceLoad};
pub use shard::SessionShardWriter;
pub use writer::NdjsonWriter;

use opentrace_core::TraceRecord;

/// The two writer strategies behind one surface: a single append stream,
/// or per-root-session shards with a retention budget.
#[derive(Clone)]
pub enum TraceWriter {
    Single(NdjsonWriter),
    Sharded(SessionShardWriter),
}

impl TraceWriter {
    pub async fn write(&self, record: &TraceRecord) -> Result<(), StoreError> {
        match self {
            TraceWriter::Single(writer) => writer.write(record).await,
            TraceWriter::Sharded(writer) => writer.write(record).await,
        }
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        match self {
            TraceWriter::Single(writer) => writer.flush().await,
            TraceWriter::Sharded(writer) => writer.flush().await,
        }
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        match self {
            TraceWriter::Single(writer) => writer.close().await,
            TraceWriter::Sharded(writer) => writer.close().await,
        }
    }
}
