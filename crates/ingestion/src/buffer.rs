//! Time-ordered sample buffer with count- and time-range-based selection.
//!
//! Records are only ever appended at the tail by the ingestion worker, so the
//! buffer stays sorted by arrival (ascending remote time) and every range
//! query can binary search.
//!
//! Locking: peeks take the read lock; append, consume and clear take the
//! write lock for their whole selection-and-mutation window.

use std::fmt;
use std::ops::Range;

use contracts::{BufferSide, CountQuery, StreamRecord, TimeRange};
use parking_lot::RwLock;

use crate::{IngestionError, Result};

/// Per-subscription record buffer.
pub struct SampleBuffer<R> {
    records: RwLock<Vec<R>>,
}

impl<R> fmt::Debug for SampleBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = self.records.read();
        f.debug_struct("SampleBuffer")
            .field("len", &records.len())
            .field("capacity", &records.capacity())
            .finish()
    }
}

impl<R: StreamRecord> SampleBuffer<R> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Append at the tail.
    #[inline]
    pub fn push(&self, record: R) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Remove and return the selected records, oldest first.
    pub fn consume_n(&self, query: CountQuery) -> Vec<R> {
        let mut records = self.records.write();
        let range = count_selection(records.len(), query);
        take_range(&mut records, range)
    }

    /// Copy the selected records, oldest first.
    pub fn peek_n(&self, query: CountQuery) -> Vec<R> {
        let records = self.records.read();
        let range = count_selection(records.len(), query);
        records[range].to_vec()
    }

    /// Remove and return every record whose time lies in `range` (inclusive).
    pub fn consume_time_range(&self, range: TimeRange) -> Result<Vec<R>> {
        ensure_time_semantics::<R>("consume_time_range")?;
        let mut records = self.records.write();
        let selected = time_selection(&records, &range);
        Ok(take_range(&mut records, selected))
    }

    /// Copy every record whose time lies in `range` (inclusive).
    pub fn peek_time_range(&self, range: TimeRange) -> Result<Vec<R>> {
        ensure_time_semantics::<R>("peek_time_range")?;
        let records = self.records.read();
        let selected = time_selection(&records, &range);
        Ok(records[selected].to_vec())
    }

    /// Discard everything. Returns the number of discarded records.
    pub fn clear(&self) -> usize {
        let mut records = self.records.write();
        let n = records.len();
        records.clear();
        n
    }

    /// Discard every record whose time lies in `range`. Returns the number discarded.
    pub fn clear_time_range(&self, range: TimeRange) -> Result<usize> {
        ensure_time_semantics::<R>("clear_time_range")?;
        let mut records = self.records.write();
        let selected = time_selection(&records, &range);
        let n = selected.len();
        if n == records.len() {
            records.clear();
        } else {
            records.drain(selected);
        }
        Ok(n)
    }
}

fn ensure_time_semantics<R: StreamRecord>(operation: &'static str) -> Result<()> {
    if R::KIND.has_time_range() {
        Ok(())
    } else {
        Err(IngestionError::UnsupportedOperation {
            operation,
            kind: R::KIND,
        })
    }
}

/// Move `range` out of `records`. A range covering the whole buffer hands
/// over the allocation instead of copying.
fn take_range<R>(records: &mut Vec<R>, range: Range<usize>) -> Vec<R> {
    if range.is_empty() {
        return Vec::new();
    }
    if range.start == 0 && range.end == records.len() {
        return std::mem::take(records);
    }
    records.drain(range).collect()
}

/// Index range for a count query, clamped to the buffer length.
fn count_selection(len: usize, query: CountQuery) -> Range<usize> {
    let n = query.count.map_or(len, |count| count.min(len));
    match query.side {
        BufferSide::Start => 0..n,
        BufferSide::End => len - n..len,
    }
}

/// Index range of records with `range.start <= time <= range.end`.
///
/// Each bound is searched independently; a bound lying outside the buffer's
/// time span includes that end without searching.
fn time_selection<R: StreamRecord>(records: &[R], range: &TimeRange) -> Range<usize> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return 0..0;
    };
    let time = |r: &R| r.time(range.field).unwrap_or_default();

    let start = if range.start <= time(first) {
        0
    } else {
        records.partition_point(|r| time(r) < range.start)
    };
    let end = if range.end >= time(last) {
        records.len()
    } else {
        records.partition_point(|r| time(r) <= range.end)
    };

    start..end.max(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ExtSignal, ExtSignalRecord, Positioning, PositioningRecord, TimeField,
    };
    use proptest::prelude::*;

    fn record(remote_time: i64) -> ExtSignalRecord {
        ExtSignalRecord {
            signal: ExtSignal {
                value: remote_time as u32,
                ..Default::default()
            },
            remote_time,
            local_time: remote_time + 5,
        }
    }

    fn buffer_with(times: &[i64]) -> SampleBuffer<ExtSignalRecord> {
        let buffer = SampleBuffer::with_capacity(times.len());
        for &t in times {
            buffer.push(record(t));
        }
        buffer
    }

    fn remote_times(records: &[ExtSignalRecord]) -> Vec<i64> {
        records.iter().map(|r| r.remote_time).collect()
    }

    fn remote_range(start: i64, end: i64) -> TimeRange {
        TimeRange {
            start,
            end,
            field: TimeField::Remote,
        }
    }

    fn all(side: BufferSide) -> CountQuery {
        CountQuery { count: None, side }
    }

    fn n(count: usize, side: BufferSide) -> CountQuery {
        CountQuery {
            count: Some(count),
            side,
        }
    }

    #[test]
    fn test_consume_time_range_inclusive() {
        let buffer = buffer_with(&[100, 200, 300, 400]);
        let out = buffer.consume_time_range(remote_range(150, 350)).unwrap();
        assert_eq!(remote_times(&out), vec![200, 300]);
        assert_eq!(remote_times(&buffer.peek_n(all(BufferSide::Start))), vec![100, 400]);
    }

    #[test]
    fn test_time_range_bounds_are_inclusive() {
        let buffer = buffer_with(&[100, 200, 300, 400]);
        let out = buffer.peek_time_range(remote_range(200, 300)).unwrap();
        assert_eq!(remote_times(&out), vec![200, 300]);
    }

    #[test]
    fn test_time_range_uses_local_time() {
        let buffer = buffer_with(&[100, 200, 300]);
        // local = remote + 5
        let local = TimeRange {
            start: 206,
            end: 306,
            field: TimeField::Local,
        };
        assert_eq!(remote_times(&buffer.peek_time_range(local).unwrap()), vec![300]);
    }

    #[test]
    fn test_default_range_consumes_everything() {
        let buffer = buffer_with(&[1, 2, 3]);
        let out = buffer.consume_time_range(TimeRange::default()).unwrap();
        assert_eq!(remote_times(&out), vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let buffer = buffer_with(&[100, 200, 300]);
        assert!(buffer.consume_time_range(remote_range(250, 150)).unwrap().is_empty());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_range_outside_buffer() {
        let buffer = buffer_with(&[100, 200]);
        assert!(buffer.peek_time_range(remote_range(300, 400)).unwrap().is_empty());
        assert!(buffer.peek_time_range(remote_range(0, 50)).unwrap().is_empty());
    }

    #[test]
    fn test_consume_n_sides() {
        let buffer = buffer_with(&[1, 2, 3, 4, 5]);
        assert_eq!(remote_times(&buffer.consume_n(n(2, BufferSide::Start))), vec![1, 2]);
        assert_eq!(remote_times(&buffer.consume_n(n(2, BufferSide::End))), vec![4, 5]);
        assert_eq!(remote_times(&buffer.peek_n(all(BufferSide::Start))), vec![3]);
    }

    #[test]
    fn test_whole_buffer_fast_path() {
        for side in [BufferSide::Start, BufferSide::End] {
            let buffer = buffer_with(&[10, 20, 30]);
            let out = buffer.consume_n(n(10, side));
            assert_eq!(remote_times(&out), vec![10, 20, 30]);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let buffer = buffer_with(&[1, 2, 3, 4]);
        let peeked = buffer.peek_n(n(3, BufferSide::Start));
        let consumed = buffer.consume_n(n(3, BufferSide::Start));
        assert_eq!(peeked, consumed);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_empty_buffer_queries() {
        let buffer = buffer_with(&[]);
        assert!(buffer.consume_n(all(BufferSide::Start)).is_empty());
        assert!(buffer.peek_n(n(1, BufferSide::End)).is_empty());
        assert!(buffer.consume_time_range(TimeRange::default()).unwrap().is_empty());
        assert_eq!(buffer.clear_time_range(TimeRange::default()).unwrap(), 0);
    }

    #[test]
    fn test_clear_time_range() {
        let buffer = buffer_with(&[100, 200, 300, 400]);
        assert_eq!(buffer.clear_time_range(remote_range(0, 250)).unwrap(), 2);
        assert_eq!(remote_times(&buffer.peek_n(all(BufferSide::Start))), vec![300, 400]);
        assert_eq!(buffer.clear(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_positioning_has_no_time_queries() {
        let buffer: SampleBuffer<PositioningRecord> = SampleBuffer::with_capacity(4);
        buffer.push(PositioningRecord {
            positioning: Positioning::default(),
        });

        let err = buffer.peek_time_range(TimeRange::default()).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedOperation { .. }));
        assert!(buffer.clear_time_range(TimeRange::default()).is_err());

        assert_eq!(buffer.peek_n(n(1, BufferSide::End)).len(), 1);
        assert_eq!(buffer.clear(), 1);
    }

    proptest! {
        #[test]
        fn prop_time_range_matches_filter(
            mut times in prop::collection::vec(0i64..1_000, 0..64),
            a in -10i64..1_010,
            b in -10i64..1_010,
        ) {
            times.sort_unstable();
            let buffer = buffer_with(&times);
            let (start, end) = (a.min(b), a.max(b));

            let expected: Vec<i64> = times.iter().copied().filter(|t| start <= *t && *t <= end).collect();
            let out = buffer.consume_time_range(remote_range(start, end)).unwrap();
            prop_assert_eq!(remote_times(&out), expected);

            let rest: Vec<i64> = times.iter().copied().filter(|t| *t < start || *t > end).collect();
            prop_assert_eq!(remote_times(&buffer.peek_n(all(BufferSide::Start))), rest);
        }

        #[test]
        fn prop_consume_keeps_buffer_sorted(
            mut times in prop::collection::vec(0i64..10_000, 1..64),
            count in 0usize..80,
            from_end in any::<bool>(),
        ) {
            times.sort_unstable();
            let buffer = buffer_with(&times);
            let side = if from_end { BufferSide::End } else { BufferSide::Start };

            let taken = buffer.consume_n(n(count, side));
            prop_assert_eq!(taken.len(), count.min(times.len()));

            let left = remote_times(&buffer.peek_n(all(BufferSide::Start)));
            prop_assert!(left.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(left.len() + taken.len(), times.len());
        }
    }
}
