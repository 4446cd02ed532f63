use crate::error::{QueueError, Result};

/// Source of truth for sequence numbers.
///
/// `low_water_mark` is the smallest sequence number not yet confirmed,
/// `next_sequence_number` the smallest not yet assigned.
/// `low_water_mark <= next_sequence_number` at all times.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SequenceTracker {
    next_sequence_number: u64,
    low_water_mark: u64,
}

impl SequenceTracker {
    pub fn new(next_sequence_number: u64, low_water_mark: u64) -> SequenceTracker {
        SequenceTracker {
            next_sequence_number,
            low_water_mark: low_water_mark.min(next_sequence_number),
        }
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    pub fn low_water_mark(&self) -> u64 {
        self.low_water_mark
    }

    pub fn has_unconfirmed(&self) -> bool {
        self.low_water_mark < self.next_sequence_number
    }

    pub fn num_unconfirmed(&self) -> u64 {
        self.next_sequence_number - self.low_water_mark
    }

    /// Returns the next sequence number and increments it.
    ///
    /// Must only be called once the record has been appended.
    pub fn assign(&mut self) -> u64 {
        let seq = self.next_sequence_number;
        self.next_sequence_number += 1;
        seq
    }

    /// Returns the low water mark once `confirmed_seq` is confirmed, without
    /// recording it.
    ///
    /// Replayed or out-of-date confirmations leave the low water mark unchanged.
    pub fn low_water_mark_after(&self, confirmed_seq: u64) -> Result<u64> {
        if confirmed_seq >= self.next_sequence_number {
            return Err(QueueError::InvalidSequenceNumber {
                seq: confirmed_seq,
                next: self.next_sequence_number,
            });
        }
        Ok(self.low_water_mark.max(confirmed_seq + 1))
    }

    /// Records that every record up to and including `confirmed_seq` is confirmed.
    ///
    /// Returns true iff the low water mark moved.
    pub fn advance(&mut self, confirmed_seq: u64) -> Result<bool> {
        let low_water_mark = self.low_water_mark_after(confirmed_seq)?;
        let moved = low_water_mark > self.low_water_mark;
        self.low_water_mark = low_water_mark;
        Ok(moved)
    }
}
