use thiserror::Error;

/// Failures that survive to a job boundary. Per-file and per-tag failures
/// are recovered before they become one of these.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The file could not be opened or its element stream is malformed.
    #[error("unreadable DICOM stream: {message}")]
    Parse { message: String },
    /// Fail-closed guard against pathological sequence nesting.
    #[error("sequence nesting exceeds {max} levels")]
    SequenceTooDeep { max: usize },
}
