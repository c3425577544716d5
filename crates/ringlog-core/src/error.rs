use ringlog_storage::StorageError;

use crate::engine::EngineState;

/// Errors produced by the ring log engine.
///
/// Malformed records are not errors: they decode to empty records so a ring
/// survives torn writes. A stamped configuration that differs from the
/// requested one is not an error either; it triggers a reformat.
#[derive(Debug, thiserror::Error)]
pub enum RingLogError {
    /// The backing object could not be opened or created.
    #[error("storage object {name} unavailable: {source}")]
    StorageUnavailable {
        name: String,
        #[source]
        source: StorageError,
    },

    /// Positioning at a slot failed. In-memory state is untouched and the
    /// operation can be retried.
    #[error("seek to slot {slot} (offset {offset}) failed: {source}")]
    SeekFailed {
        slot: u32,
        offset: u64,
        #[source]
        source: StorageError,
    },

    /// Fewer or more bytes were persisted than a record occupies.
    #[error("wrote {actual} bytes to slot {slot}, records are {expected} bytes")]
    WriteLengthMismatch {
        slot: u32,
        expected: usize,
        actual: usize,
    },

    /// The operation needs an open store.
    #[error("ring log is {state}, not open")]
    NotOpen { state: EngineState },

    /// Every `u32` line identifier has been handed out.
    #[error("line identifiers exhausted at {last}")]
    LineIdsExhausted { last: u32 },

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, RingLogError>;
