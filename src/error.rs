use chrono::{DateTime, Utc};
use thiserror::Error;

/// Hard errors at the engine boundary.
///
/// Missing directories, unparsable lines and unreadable files are not errors; they
/// are counted in [`crate::models::ScanHealth`] and the query still succeeds.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
