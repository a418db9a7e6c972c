use std::io;
use thiserror::Error;

/// Error type for pack build, descriptor and VFS operations.
#[derive(Error, Debug)]
pub enum LpError {
    /// Path not present in a `Reader`, or a source file not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// `Reader` ingestion saw a second entry at this path.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Descriptor or manifest field has the wrong shape.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// Descriptor or manifest is missing a required field.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Descriptor parse/eval error.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// A non-rewindable stream source was reopened while latched.
    #[error("source busy")]
    SourceBusy,

    /// Archive codec walk error, typically a corrupt pack.
    #[error("scan error: {0}")]
    Scan(String),

    /// Archive codec failed to open for reading or writing.
    #[error("open error: {0}")]
    Open(String),

    /// Archive codec failed while writing.
    #[error("write error: {0}")]
    Write(String),

    /// Archive codec failed while closing.
    #[error("close error: {0}")]
    Close(String),

    /// Underlying I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Allocator failure.
    #[error("out of memory")]
    OutOfMemory,

    /// Cancellation token tripped.
    #[error("cancelled")]
    Cancelled,
}

impl LpError {
    /// The stable short code used in the `domain: code: message` CLI format.
    pub fn code(&self) -> &'static str {
        match self {
            LpError::NotFound(_) => "not-found",
            LpError::DuplicateEntry(_) => "duplicate-entry",
            LpError::InvalidField(_) => "invalid-field",
            LpError::MissingField(_) => "missing-field",
            LpError::LoadFailed(_) => "load-failed",
            LpError::SourceBusy => "source-busy",
            LpError::Scan(_) => "scan",
            LpError::Open(_) => "open",
            LpError::Write(_) => "write",
            LpError::Close(_) => "close",
            LpError::Io(_) => "io",
            LpError::OutOfMemory => "out-of-memory",
            LpError::Cancelled => "cancelled",
        }
    }
}

/// Result type alias for pack operations.
pub type Result<T> = std::result::Result<T, LpError>;
