/// Errors from storage adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The named object does not exist.
    #[error("storage object not found: {0}")]
    NotFound(String),

    /// The object name cannot be mapped onto the backend.
    #[error("invalid storage object name: {0:?}")]
    InvalidName(String),

    /// Seek target lies beyond what the backend can address.
    #[error("seek to offset {offset} is out of range for {name}")]
    SeekOutOfRange { name: String, offset: u64 },

    /// A fault injected by a test backend.
    #[error("injected fault: {0}")]
    InjectedFault(&'static str),

    /// I/O error from the underlying device or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
