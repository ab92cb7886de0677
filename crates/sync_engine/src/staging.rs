//! Gaze / eye openness staging queue.
//!
//! Gaze and eye openness partials share the device timestamp domain but are
//! delivered independently. Each arrival is merged into the staged entry with
//! the same device timestamp; entries leave the queue once their complementary
//! partial has arrived, or once it can no longer arrive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{EyeOpennessData, GazeData, GazeSample};
use parking_lot::Mutex;
use tracing::{instrument, trace};

/// One partial measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazePart {
    Gaze(GazeData),
    Openness(EyeOpennessData),
}

impl GazePart {
    #[inline]
    pub fn device_time_stamp(&self) -> i64 {
        match self {
            GazePart::Gaze(g) => g.device_time_stamp,
            GazePart::Openness(o) => o.device_time_stamp,
        }
    }

    #[inline]
    fn system_time_stamp(&self) -> i64 {
        match self {
            GazePart::Gaze(g) => g.system_time_stamp,
            GazePart::Openness(o) => o.system_time_stamp,
        }
    }
}

/// A gaze sample leaving the merger, with which partials it contains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedGaze {
    pub sample: GazeSample,
    pub has_gaze: bool,
    pub has_openness: bool,
}

impl MergedGaze {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.has_gaze && self.has_openness
    }

    fn new(part: &GazePart) -> Self {
        let mut merged = Self {
            sample: GazeSample {
                device_time_stamp: part.device_time_stamp(),
                system_time_stamp: part.system_time_stamp(),
                ..Default::default()
            },
            has_gaze: false,
            has_openness: false,
        };
        merged.apply(part);
        merged
    }

    /// Copy the fields `part` provides, leaving the other partial untouched.
    fn apply(&mut self, part: &GazePart) {
        match part {
            GazePart::Gaze(g) => {
                let (left_openness, right_openness) = (
                    self.sample.left.eye_openness,
                    self.sample.right.eye_openness,
                );
                self.sample.left = g.left;
                self.sample.right = g.right;
                self.sample.left.eye_openness = left_openness;
                self.sample.right.eye_openness = right_openness;
                self.has_gaze = true;
            }
            GazePart::Openness(o) => {
                self.sample.left.eye_openness = o.left;
                self.sample.right.eye_openness = o.right;
                self.has_openness = true;
            }
        }
    }

    /// Whether the partial that `part` does not supply is already present.
    #[inline]
    fn has_complement_of(&self, part: &GazePart) -> bool {
        match part {
            GazePart::Gaze(_) => self.has_openness,
            GazePart::Openness(_) => self.has_gaze,
        }
    }
}

/// Merge/staging buffer for the gaze outlet.
///
/// The queue is guarded by its own lock and never touches inlet state.
/// Emission order is non-decreasing in device timestamp provided each
/// source delivers in order.
#[derive(Debug, Default)]
pub struct GazeMerger {
    staging: Mutex<VecDeque<MergedGaze>>,
    /// Hint that `staging` is non-empty, checked without the lock on the unmerged path.
    has_staged: AtomicBool,
}

impl GazeMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one partial. Returns the samples to publish, oldest first.
    ///
    /// `merge` is true while both gaze and eye openness are being delivered.
    /// Without merging the partial is emitted immediately, after anything
    /// still staged from an earlier merging period.
    #[instrument(
        level = "trace",
        name = "gaze_merger_push",
        skip(self, part),
        fields(device_time_stamp = part.device_time_stamp())
    )]
    pub fn push(&self, part: GazePart, merge: bool) -> Vec<MergedGaze> {
        if !merge {
            let mut emit = self.drain();
            emit.push(MergedGaze::new(&part));
            Self::record(&emit);
            return emit;
        }

        let t = part.device_time_stamp();
        let mut emit = Vec::new();
        let mut target = None;

        let mut staging = self.staging.lock();
        let mut i = 0;
        while i < staging.len() {
            let entry = &staging[i];
            if entry.sample.device_time_stamp < t && entry.has_complement_of(&part) {
                // older than t and already has the other partial: nothing more can arrive for it
                if let Some(done) = staging.remove(i) {
                    emit.push(done);
                }
                continue;
            }
            if entry.sample.device_time_stamp == t {
                target = staging.remove(i);
                break;
            }
            i += 1;
        }

        match target {
            Some(mut entry) => {
                entry.apply(&part);
                emit.push(entry);
            }
            None => staging.push_back(MergedGaze::new(&part)),
        }

        let depth = staging.len();
        self.has_staged.store(depth > 0, Ordering::Release);
        drop(staging);

        observability::record_staging_depth(depth);
        if !emit.is_empty() {
            trace!(emitted = emit.len(), staged = depth, "gaze merger emitted samples");
            Self::record(&emit);
        }
        emit
    }

    /// Remove and return everything staged, oldest first.
    pub fn drain(&self) -> Vec<MergedGaze> {
        if !self.has_staged.load(Ordering::Acquire) {
            return Vec::new();
        }
        let mut staging = self.staging.lock();
        let drained: Vec<_> = staging.drain(..).collect();
        self.has_staged.store(false, Ordering::Release);
        drop(staging);

        if !drained.is_empty() {
            trace!(count = drained.len(), "flushed gaze staging queue");
            observability::record_staging_flush(drained.len());
            observability::record_staging_depth(0);
        }
        drained
    }

    /// Number of staged entries.
    pub fn staged_len(&self) -> usize {
        self.staging.lock().len()
    }

    fn record(emit: &[MergedGaze]) {
        let complete = emit.iter().filter(|m| m.is_complete()).count();
        observability::record_merge_emitted(complete, emit.len() - complete);
    }
}
