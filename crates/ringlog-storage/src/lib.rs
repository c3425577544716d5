//! Storage adapter contract for ringlog.
//!
//! The ring log engine never performs raw device I/O. It talks to a flat
//! namespace of named byte objects through the [`Storage`] trait and to an
//! open object through a [`StorageHandle`]: seek, read up to a delimiter,
//! write a terminated line, flush.
//!
//! # Backends
//!
//! - [`InMemoryStorage`] -- shared `HashMap` store with fault injection, for
//!   tests and embedding
//! - [`FileStorage`] -- one file per object below a root directory
//!
//! # Contract
//!
//! 1. Handles are exclusively owned; there is no locking between handles.
//! 2. `write_line` reports how many payload bytes were persisted so callers
//!    can verify fixed-width records.
//! 3. A seek beyond the end of the object fails instead of extending it.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::{FileHandle, FileStorage};
pub use memory::{InMemoryHandle, InMemoryStorage};
pub use traits::{OpenMode, Storage, StorageHandle};
