use crate::error::StorageResult;

/// How a named object is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing object for reading and writing without truncating it.
    ReadWrite,
    /// Create the object, truncating any existing content, for reading and
    /// writing.
    Create,
}

/// A flat namespace of persistent byte objects.
///
/// The ring log never touches the device directly; everything it needs goes
/// through this trait and the handles it hands out. Implementations must
/// satisfy:
/// - Writes through a handle are visible to later reads through the same
///   handle once `flush` returns.
/// - `size` reflects flushed content.
/// - `remove` of a missing object is not an error.
pub trait Storage {
    type Handle: StorageHandle;

    /// Check whether the named object exists.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Open the named object.
    ///
    /// `OpenMode::ReadWrite` fails with `StorageError::NotFound` when the
    /// object does not exist.
    fn open(&self, name: &str, mode: OpenMode) -> StorageResult<Self::Handle>;

    /// Delete the named object. Returns `true` if it existed.
    fn remove(&self, name: &str) -> StorageResult<bool>;

    /// Size of the named object in bytes.
    fn size(&self, name: &str) -> StorageResult<u64>;

    /// Called periodically during long scans so hosts with a cooperative
    /// scheduler can service other work. Defaults to a no-op.
    fn yield_now(&self) {}
}

/// An open, positioned view of one storage object.
pub trait StorageHandle {
    /// Position the handle at `offset` bytes from the start of the object.
    fn seek(&mut self, offset: u64) -> StorageResult<()>;

    /// Current position in bytes from the start of the object.
    fn position(&self) -> u64;

    /// Read bytes into `buf` until `delimiter` is consumed, `max_bytes` have
    /// been read, or the object ends. The delimiter is not stored in `buf`.
    /// Returns the number of bytes placed in `buf`.
    fn read_until(&mut self, delimiter: u8, max_bytes: usize, buf: &mut Vec<u8>)
        -> StorageResult<usize>;

    /// Write `bytes` followed by a single `\n` terminator.
    ///
    /// Returns how many bytes of `bytes` were persisted; the terminator is
    /// not counted. A short count signals a storage inconsistency.
    fn write_line(&mut self, bytes: &[u8]) -> StorageResult<usize>;

    /// Push buffered writes down to the device.
    fn flush(&mut self) -> StorageResult<()>;

    /// Flush and release the handle. Further use is a logic error.
    fn close(&mut self) -> StorageResult<()>;

    /// Bytes remaining between the current position and the end of the
    /// object.
    fn bytes_available(&mut self) -> StorageResult<u64>;
}
