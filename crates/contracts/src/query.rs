//! Selection parameters for buffer queries.

use serde::{Deserialize, Serialize};

/// Which end of a time-ordered buffer a count-based query selects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSide {
    /// Oldest records.
    #[default]
    Start,
    /// Newest records.
    End,
}

/// Which time field a range query compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    /// Remote timestamp corrected into the local clock.
    #[default]
    Local,
    /// Raw remote (publisher clock) timestamp.
    Remote,
}

impl TimeField {
    pub fn from_local_flag(use_local_time: bool) -> Self {
        if use_local_time {
            TimeField::Local
        } else {
            TimeField::Remote
        }
    }
}

/// Inclusive time range in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
    pub field: TimeField,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: i64::MAX,
            field: TimeField::Local,
        }
    }
}

impl TimeRange {
    /// Build a range, filling unspecified arguments with defaults.
    pub fn new(start: Option<i64>, end: Option<i64>, use_local_time: Option<bool>) -> Self {
        let defaults = Self::default();
        Self {
            start: start.unwrap_or(defaults.start),
            end: end.unwrap_or(defaults.end),
            field: use_local_time
                .map(TimeField::from_local_flag)
                .unwrap_or(defaults.field),
        }
    }

    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Count-based selection; `count = None` selects everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountQuery {
    pub count: Option<usize>,
    pub side: BufferSide,
}

impl CountQuery {
    /// Default for consume: the whole buffer from the start.
    pub fn consume(count: Option<usize>, side: Option<BufferSide>) -> Self {
        Self {
            count,
            side: side.unwrap_or(BufferSide::Start),
        }
    }

    /// Default for peek: the most recent record.
    pub fn peek(count: Option<usize>, side: Option<BufferSide>) -> Self {
        Self {
            count: Some(count.unwrap_or(1)),
            side: side.unwrap_or(BufferSide::End),
        }
    }
}
