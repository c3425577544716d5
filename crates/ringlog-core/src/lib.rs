//! Circular log engine for ringlog.
//!
//! A ring log keeps the most recent `capacity` lines of text in a single
//! storage object of fixed size. Every line occupies one fixed-width record,
//! line `n` always lands in slot `n % capacity + 1`, and slot 0 stamps the
//! configuration the store was formatted with. Appends overwrite the oldest
//! line once the ring is full; reopening a store rebuilds the live range by
//! scanning the slots for the highest intact line id.
//!
//! # Key Types
//!
//! - [`RingLog`] -- format/open/recover, append, windowed reads, dump
//! - [`ReadCursor`] -- forward-only window over line ids
//! - [`Record`] / [`Metadata`] -- the fixed-width record codec
//! - [`DiagnosticSink`] -- optional human-readable diagnostics channel
//!
//! # Design Rules
//!
//! 1. Bookkeeping changes only after the storage operation behind it
//!    succeeded; a failed append can simply be retried.
//! 2. Malformed slots decode as empty, never as errors.
//! 3. A store whose stamped configuration or size does not match the request
//!    is reformatted, not repaired.

pub mod cursor;
pub mod engine;
pub mod error;
pub mod record;
pub mod sink;
pub mod text;

pub use cursor::{Lines, ReadCursor};
pub use engine::{EngineState, RingLog, RingStatus, SlotDump, SlotMarker, DEFAULT_NAME};
pub use error::{Result, RingLogError};
pub use record::{Metadata, Record};
pub use sink::{DiagnosticSink, Diagnostics, MemorySink, WriterSink, MAX_DEBUG_LEVEL};
