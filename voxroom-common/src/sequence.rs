//! Sequence gap detection for inbound audio
//!
//! Receivers track the last sequence index seen from each sender to notice
//! lost or reordered segments. Nothing is buffered or reordered here.

/// Classification of an inbound sequence index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First segment seen from this sender
    First,
    /// Exactly one past the previous index
    InOrder,
    /// Indices were skipped; `missing` segments never arrived (yet)
    Gap { missing: u32 },
    /// Index at or before the newest seen: a duplicate or a reordered segment
    Late { behind: u32 },
}

/// Tracks the newest sequence index from one sender
#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    newest: Option<i32>,
    received: u64,
    missing: u64,
    late: u64,
}

impl SequenceTracker {
    /// Create a tracker that has seen nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound index and classify it
    ///
    /// Indices compare with wrapping arithmetic, so a stream that runs past
    /// `i32::MAX` continues at `i32::MIN` in order. An index up to `i32::MAX`
    /// ahead of the newest counts as forward, anything else as late. Late
    /// segments do not move the newest index backwards.
    pub fn observe(&mut self, index: i32) -> SequenceCheck {
        self.received += 1;

        let Some(newest) = self.newest else {
            self.newest = Some(index);
            return SequenceCheck::First;
        };

        let delta = index.wrapping_sub(newest);
        if delta <= 0 {
            self.late += 1;
            return SequenceCheck::Late {
                behind: delta.unsigned_abs(),
            };
        }

        self.newest = Some(index);
        if delta == 1 {
            SequenceCheck::InOrder
        } else {
            // delta is in 2..=i32::MAX here
            let missing = delta.unsigned_abs() - 1;
            self.missing += u64::from(missing);
            SequenceCheck::Gap { missing }
        }
    }

    /// Newest index seen so far
    pub fn newest(&self) -> Option<i32> {
        self.newest
    }

    /// Total segments observed
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Total indices skipped across all gaps
    pub fn missing(&self) -> u64 {
        self.missing
    }

    /// Total duplicate or reordered segments
    pub fn late(&self) -> u64 {
        self.late
    }

    /// Forget everything (e.g. when the sender restarts its stream)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
