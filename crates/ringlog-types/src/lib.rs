//! Foundation types for ringlog.
//!
//! A ring log is a fixed number of equal-width text records stored in a
//! single persistent object. Physical slot 0 holds a metadata record; slots
//! `1..=capacity` hold data. This crate owns the numbers every other crate
//! agrees on: the configuration bounds, the record width arithmetic, and the
//! mapping from a line identifier to a byte offset.
//!
//! # Key Types
//!
//! - [`RingConfig`] -- capacity and line width, clamped to supported bounds
//! - [`RingGeometry`] -- line id → physical slot → byte offset

pub mod config;
pub mod geometry;

pub use config::{
    RingConfig, KEY_FIELD_WIDTH, MAX_LINE_WIDTH, MIN_CAPACITY, MIN_LINE_WIDTH,
};
pub use geometry::{byte_offset_for, slot_for, store_size, RingGeometry};

/// Monotonically increasing identifier of an appended line.
pub type LineId = u32;
