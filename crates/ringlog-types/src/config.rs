use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest accepted payload line width in bytes.
pub const MIN_LINE_WIDTH: u32 = 50;
/// Largest accepted payload line width in bytes.
pub const MAX_LINE_WIDTH: u32 = 150;
/// Smallest accepted number of data slots.
pub const MIN_CAPACITY: u32 = 10;
/// Width of the `"%07u|"` sequence-key prefix plus the trailing filler byte.
pub const KEY_FIELD_WIDTH: u32 = 9;

/// Shape of a ring store: how many data slots it has and how wide each
/// line is.
///
/// Both values are stamped into the metadata record when the store is
/// formatted. Opening a store with a different (clamped) configuration
/// discards its contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingConfig {
    /// Number of usable data slots.
    pub capacity: u32,
    /// Payload line width in bytes.
    pub line_width: u32,
}

impl RingConfig {
    /// Create a configuration, clamping both values into range.
    pub fn new(capacity: u32, line_width: u32) -> Self {
        Self {
            capacity,
            line_width,
        }
        .clamped()
    }

    /// Return a copy with `line_width` in `[MIN_LINE_WIDTH, MAX_LINE_WIDTH]`
    /// and `capacity >= MIN_CAPACITY`.
    pub fn clamped(self) -> Self {
        Self {
            capacity: self.capacity.max(MIN_CAPACITY),
            line_width: self.line_width.clamp(MIN_LINE_WIDTH, MAX_LINE_WIDTH),
        }
    }

    /// Returns `true` if both values are already within bounds.
    pub fn is_clamped(&self) -> bool {
        *self == self.clamped()
    }

    /// Bytes of record content per slot, excluding the line terminator.
    pub fn record_length(&self) -> u32 {
        self.line_width + KEY_FIELD_WIDTH
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            line_width: 80,
        }
    }
}

impl fmt::Display for RingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lines x {} bytes", self.capacity, self.line_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_line_width() {
        assert_eq!(RingConfig::new(20, 10).line_width, MIN_LINE_WIDTH);
        assert_eq!(RingConfig::new(20, 500).line_width, MAX_LINE_WIDTH);
        assert_eq!(RingConfig::new(20, 75).line_width, 75);
    }

    #[test]
    fn new_clamps_capacity() {
        assert_eq!(RingConfig::new(0, 60).capacity, MIN_CAPACITY);
        assert_eq!(RingConfig::new(9, 60).capacity, MIN_CAPACITY);
        assert_eq!(RingConfig::new(250, 60).capacity, 250);
    }

    #[test]
    fn record_length_adds_key_field() {
        assert_eq!(RingConfig::new(10, 50).record_length(), 59);
        assert_eq!(RingConfig::new(10, 150).record_length(), 159);
    }

    #[test]
    fn struct_literal_is_not_clamped_until_asked() {
        let raw = RingConfig {
            capacity: 3,
            line_width: 200,
        };
        assert!(!raw.is_clamped());
        assert!(raw.clamped().is_clamped());
    }

    #[test]
    fn serde_roundtrip() {
        let config = RingConfig::new(42, 64);
        let json = serde_json::to_string(&config).unwrap();
        let back: RingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(RingConfig::new(10, 50).to_string(), "10 lines x 50 bytes");
    }
}
