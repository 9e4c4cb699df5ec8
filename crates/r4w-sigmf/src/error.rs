//! Error types for SigMF recording and playback.

/// Result type for SigMF operations
pub type SigMfResult<T> = Result<T, SigMfError>;

/// Errors that can occur while recording or replaying a SigMF pair
#[derive(Debug, thiserror::Error)]
pub enum SigMfError {
    /// Call made in the wrong lifecycle state (e.g. write after close)
    #[error("State error: {0}")]
    State(String),

    /// Malformed metadata document, missing mandatory field, or unknown datatype
    #[error("Format error: {0}")]
    Format(String),

    /// Underlying file append/read failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Negative, out-of-chunk, or non-monotonic sample offset
    #[error("Range error: {0}")]
    Range(String),

    /// Configuration file could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SigMfError {
    fn from(e: serde_json::Error) -> Self {
        SigMfError::Format(e.to_string())
    }
}

impl SigMfError {
    /// True for errors that end a recording session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SigMfError::Io(_))
    }
}
