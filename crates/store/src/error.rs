use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The writer actor is gone — closed, or its task panicked.
    #[error("writer closed")]
    WriterClosed,
    /// A previous append failed; the stream is poisoned until reopened.
    #[error("writer failed: {0}")]
    WriterFailed(String),
}
