use std::cmp::Ordering;

use ringlog_storage::Storage;
use ringlog_types::LineId;

use crate::engine::RingLog;
use crate::error::Result;

/// Forward-only position over a window of line ids.
///
/// Invariant: `position <= limit + 1`. An exhausted cursor has
/// `position == limit + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadCursor {
    position: u64,
    limit: u64,
}

impl ReadCursor {
    /// Resolve a requested window against the live range
    /// `[oldest, newest]`.
    ///
    /// - `start == 0` reads from the oldest live line.
    /// - `start > 0` skips `start` lines forward from the oldest.
    /// - `start < 0` counts back from the newest: the window ends
    ///   `|start|` lines before the newest and holds `count` lines, or runs
    ///   to the newest when `count == 0`.
    /// - `count == 0` reads through the newest line.
    ///
    /// Lines overwritten after the cursor was created are skipped, not
    /// re-emitted under their new id.
    ///
    /// A window that starts before `oldest` is moved up to it; one that
    /// starts after `newest` collapses back to `oldest`. The end is capped
    /// at `newest`. An empty ring (`oldest == newest + 1`) always yields an
    /// exhausted cursor.
    pub fn window(start: i32, count: u32, oldest: LineId, newest: LineId) -> Self {
        let oldest = i64::from(oldest);
        let newest = i64::from(newest);
        let count = i64::from(count);

        let mut position = match start.cmp(&0) {
            Ordering::Equal => oldest,
            Ordering::Greater => oldest + i64::from(start),
            Ordering::Less => newest + 1 - (i64::from(start).abs() + count),
        };
        if position < oldest || position > newest {
            position = oldest;
        }

        let mut limit = if count == 0 {
            newest
        } else {
            position + count - 1
        };
        if limit > newest {
            limit = newest;
        }

        Self {
            position: position as u64,
            limit: limit as u64,
        }
    }

    /// A cursor that yields nothing.
    pub fn exhausted() -> Self {
        Self {
            position: 1,
            limit: 0,
        }
    }

    /// Next line id the cursor will visit.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Last line id in the window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Line ids left to visit, including empty or stale slots.
    pub fn remaining(&self) -> u64 {
        (self.limit + 1).saturating_sub(self.position)
    }

    pub fn is_exhausted(&self) -> bool {
        self.position > self.limit
    }

    /// The id at the current position, without moving.
    pub(crate) fn peek(&self) -> Option<LineId> {
        if self.is_exhausted() {
            None
        } else {
            LineId::try_from(self.position).ok()
        }
    }

    /// Step past the current position.
    pub(crate) fn advance(&mut self) {
        if !self.is_exhausted() {
            self.position += 1;
        }
    }

    pub(crate) fn finish(&mut self) {
        self.position = self.limit + 1;
    }
}

/// Iterator over the live lines of a window, borrowing the ring log.
///
/// Yields `Err` once if a storage operation fails, then stops.
pub struct Lines<'a, S: Storage> {
    log: &'a mut RingLog<S>,
    cursor: ReadCursor,
    failed: bool,
}

impl<'a, S: Storage> Lines<'a, S> {
    pub(crate) fn new(log: &'a mut RingLog<S>, cursor: ReadCursor) -> Self {
        Self {
            log,
            cursor,
            failed: false,
        }
    }

    pub fn cursor(&self) -> ReadCursor {
        self.cursor
    }
}

impl<S: Storage> Iterator for Lines<'_, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.log.read_next(&mut self.cursor) {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                self.cursor.finish();
                Some(Err(e))
            }
        }
    }
}

impl<S: Storage> std::iter::FusedIterator for Lines<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(cursor: ReadCursor) -> (u64, u64) {
        (cursor.position(), cursor.limit())
    }

    #[test]
    fn full_window() {
        assert_eq!(bounds(ReadCursor::window(0, 0, 6, 15)), (6, 15));
        assert_eq!(ReadCursor::window(0, 0, 6, 15).remaining(), 10);
    }

    #[test]
    fn skip_forward_from_oldest() {
        assert_eq!(bounds(ReadCursor::window(3, 0, 6, 15)), (9, 15));
        assert_eq!(bounds(ReadCursor::window(3, 2, 6, 15)), (9, 10));
    }

    #[test]
    fn skip_beyond_newest_collapses_to_oldest() {
        assert_eq!(bounds(ReadCursor::window(50, 0, 6, 15)), (6, 15));
    }

    #[test]
    fn tail_window() {
        // the last four lines
        assert_eq!(bounds(ReadCursor::window(-4, 0, 6, 15)), (12, 15));
        // three lines ending four before the newest
        assert_eq!(bounds(ReadCursor::window(-4, 3, 6, 15)), (9, 11));
    }

    #[test]
    fn tail_window_is_clamped_to_oldest() {
        assert_eq!(bounds(ReadCursor::window(-100, 0, 6, 15)), (6, 15));
    }

    #[test]
    fn count_is_capped_at_newest() {
        assert_eq!(bounds(ReadCursor::window(0, 100, 1, 5)), (1, 5));
    }

    #[test]
    fn empty_ring_is_exhausted() {
        for start in [-5, 0, 5] {
            let cursor = ReadCursor::window(start, 3, 1, 0);
            assert!(cursor.is_exhausted());
            assert_eq!(cursor.position(), cursor.limit() + 1);
            assert_eq!(cursor.peek(), None);
        }
    }

    #[test]
    fn advance_stops_one_past_limit() {
        let mut cursor = ReadCursor::window(0, 2, 1, 10);
        assert_eq!(cursor.peek(), Some(1));
        cursor.advance();
        assert_eq!(cursor.peek(), Some(2));
        cursor.advance();
        assert_eq!(cursor.peek(), None);
        cursor.advance();
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn exhausted_cursor_yields_nothing() {
        let cursor = ReadCursor::exhausted();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn window_at_id_space_end() {
        let cursor = ReadCursor::window(0, 0, u32::MAX - 9, u32::MAX);
        assert_eq!(cursor.remaining(), 10);
        assert_eq!(cursor.limit(), u64::from(u32::MAX));
    }
}
