use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::media::ToolError;
use crate::infrastructure::storage::StorageError;

/// Everything that can end a transcode job. The worker loop turns any of
/// these into a single FAILED result event; nothing escapes past it.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("object storage: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker pool unavailable")]
    PoolClosed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder produced no output in {0}")]
    EmptyRendition(PathBuf),

    #[error("quality {quality} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        quality: String,
        attempts: u32,
        last_error: String,
    },
}
