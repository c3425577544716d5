//! Ring addressing.
//!
//! Pure arithmetic mapping a line identifier to the physical slot that holds
//! it and the byte offset where that slot starts. Slot 0 is reserved for the
//! metadata record, so data slots are numbered `1..=capacity`. Every slot is
//! `record_length` bytes of content followed by a one-byte `\n` terminator.
//!
//! ```text
//! offset 0                       record_length + 1         2 * (record_length + 1)
//! | slot 0: metadata        \r\n | slot 1: data       \r\n | slot 2: data ...
//! ```
//!
//! Callers must pass a capacity of at least one (configurations are clamped
//! to `MIN_CAPACITY` before they reach this module).

use crate::config::RingConfig;
use crate::LineId;

/// Physical slot holding `line_id` in a ring of `capacity` data slots.
pub fn slot_for(line_id: LineId, capacity: u32) -> u32 {
    (line_id % capacity) + 1
}

/// Byte offset of the start of physical slot `slot`.
pub fn byte_offset_for(slot: u32, record_length: u32) -> u64 {
    u64::from(slot) * (u64::from(record_length) + 1)
}

/// Total size in bytes of a formatted store.
pub fn store_size(capacity: u32, record_length: u32) -> u64 {
    byte_offset_for(capacity + 1, record_length)
}

/// Capacity and record length bundled for repeated address computations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingGeometry {
    capacity: u32,
    record_length: u32,
}

impl RingGeometry {
    pub fn new(capacity: u32, record_length: u32) -> Self {
        Self {
            capacity,
            record_length,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn record_length(&self) -> u32 {
        self.record_length
    }

    /// Distance in bytes between the starts of consecutive slots.
    pub fn stride(&self) -> u64 {
        u64::from(self.record_length) + 1
    }

    pub fn slot_for(&self, line_id: LineId) -> u32 {
        slot_for(line_id, self.capacity)
    }

    pub fn byte_offset_for(&self, slot: u32) -> u64 {
        byte_offset_for(slot, self.record_length)
    }

    /// Byte offset of the slot that holds `line_id`.
    pub fn offset_for_line(&self, line_id: LineId) -> u64 {
        self.byte_offset_for(self.slot_for(line_id))
    }

    /// Byte offset of the metadata record.
    pub fn metadata_offset(&self) -> u64 {
        0
    }

    pub fn store_size(&self) -> u64 {
        store_size(self.capacity, self.record_length)
    }

    /// Iterate over the data slot numbers `1..=capacity`.
    pub fn data_slots(&self) -> impl Iterator<Item = u32> {
        1..=self.capacity
    }
}

impl From<RingConfig> for RingGeometry {
    fn from(config: RingConfig) -> Self {
        Self::new(config.capacity, config.record_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slot_zero_is_never_a_data_slot() {
        for id in 0..100 {
            assert_ne!(slot_for(id, 10), 0);
        }
    }

    #[test]
    fn slot_wraps_at_capacity() {
        assert_eq!(slot_for(1, 10), 2);
        assert_eq!(slot_for(9, 10), 10);
        assert_eq!(slot_for(10, 10), 1);
        assert_eq!(slot_for(11, 10), 2);
    }

    #[test]
    fn offsets_include_terminator() {
        // line_width 50 -> record_length 59 -> stride 60
        let geo = RingGeometry::from(RingConfig::new(10, 50));
        assert_eq!(geo.stride(), 60);
        assert_eq!(geo.metadata_offset(), 0);
        assert_eq!(geo.byte_offset_for(1), 60);
        assert_eq!(geo.offset_for_line(1), 120);
        assert_eq!(geo.store_size(), 11 * 60);
    }

    #[test]
    fn data_slots_cover_capacity() {
        let geo = RingGeometry::new(10, 59);
        let slots: Vec<u32> = geo.data_slots().collect();
        assert_eq!(slots.len(), 10);
        assert_eq!(slots.first(), Some(&1));
        assert_eq!(slots.last(), Some(&10));
    }

    #[test]
    fn large_offsets_do_not_overflow() {
        let geo = RingGeometry::new(u32::MAX - 1, 159);
        assert_eq!(geo.store_size(), u64::from(u32::MAX) * 160);
    }

    proptest! {
        #[test]
        fn slot_in_data_range(id in any::<u32>(), capacity in 10u32..5000) {
            let slot = slot_for(id, capacity);
            prop_assert!(slot >= 1 && slot <= capacity);
        }

        #[test]
        fn ids_one_ring_apart_share_a_slot(id in 0u32..1_000_000, capacity in 10u32..5000) {
            prop_assert_eq!(slot_for(id, capacity), slot_for(id + capacity, capacity));
        }

        #[test]
        fn consecutive_ids_within_a_ring_are_distinct(
            start in 0u32..1_000_000,
            capacity in 10u32..500,
        ) {
            let mut slots: Vec<u32> = (start..start + capacity)
                .map(|id| slot_for(id, capacity))
                .collect();
            slots.sort_unstable();
            slots.dedup();
            prop_assert_eq!(slots.len() as u32, capacity);
        }

        #[test]
        fn offsets_are_stride_aligned(slot in 0u32..100_000, record_length in 59u32..160) {
            let offset = byte_offset_for(slot, record_length);
            prop_assert_eq!(offset % (u64::from(record_length) + 1), 0);
        }
    }
}
