//! Jump table: frame-boundary index of a multi-frame stream
//!
//! Record `i` holds the cumulative compressed and uncompressed byte counts at
//! the start of frame `i`, so record 0 is always `(0, 0)`. Once the table is
//! complete its last record marks end-of-stream and a stream of `F` frames is
//! described by `F + 1` records.
//!
//! Records are strictly increasing in both fields. The table only grows by
//! appending; nothing is ever rewritten or removed.

use serde::{Deserialize, Serialize};
use zseek_core::{ZseekError, ZseekResult};

/// One frame boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpTableRecord {
    /// Compressed bytes preceding the boundary
    pub compressed_pos: u64,
    /// Uncompressed bytes preceding the boundary
    pub uncompressed_pos: u64,
}

impl JumpTableRecord {
    pub const ORIGIN: JumpTableRecord = JumpTableRecord {
        compressed_pos: 0,
        uncompressed_pos: 0,
    };

    pub fn new(compressed_pos: u64, uncompressed_pos: u64) -> Self {
        Self {
            compressed_pos,
            uncompressed_pos,
        }
    }
}

/// Append-only index of frame boundaries, partial until end-of-stream is recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpTable {
    records: Vec<JumpTableRecord>,
    complete: bool,
}

impl JumpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a boundary.
    ///
    /// The first record must be `(0, 0)`; every later one must be strictly
    /// greater than its predecessor in both fields. On error the table is
    /// left as it was.
    pub fn append(&mut self, compressed_pos: u64, uncompressed_pos: u64) -> ZseekResult<()> {
        if self.complete {
            return Err(ZseekError::TableComplete);
        }
        match self.records.last().copied() {
            None if compressed_pos == 0 && uncompressed_pos == 0 => {}
            Some(prev)
                if compressed_pos > prev.compressed_pos
                    && uncompressed_pos > prev.uncompressed_pos => {}
            prev => {
                // An empty table only accepts the origin
                let prev = prev.unwrap_or(JumpTableRecord::ORIGIN);
                return Err(ZseekError::NonMonotonicRecord {
                    compressed: compressed_pos,
                    uncompressed: uncompressed_pos,
                    prev_compressed: prev.compressed_pos,
                    prev_uncompressed: prev.uncompressed_pos,
                });
            }
        }
        self.records.push(JumpTableRecord::new(compressed_pos, uncompressed_pos));
        Ok(())
    }

    /// Declare that the last record marks end-of-stream.
    ///
    /// An empty table becomes `[(0, 0)]`, the index of an empty stream.
    pub fn mark_complete(&mut self) {
        if self.records.is_empty() {
            self.records.push(JumpTableRecord::ORIGIN);
        }
        self.complete = true;
    }

    /// True once the end-of-stream record is known.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<JumpTableRecord> {
        self.records.get(index).copied()
    }

    pub fn records(&self) -> &[JumpTableRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<JumpTableRecord> {
        self.records.last().copied()
    }

    /// Highest uncompressed offset proven reachable so far (0 when empty).
    ///
    /// This is the stream size only when the table is complete.
    pub fn last_known_uncompressed_offset(&self) -> u64 {
        self.records.last().map_or(0, |r| r.uncompressed_pos)
    }

    /// Compressed offset where the next undiscovered frame starts.
    pub fn last_known_compressed_offset(&self) -> u64 {
        self.records.last().map_or(0, |r| r.compressed_pos)
    }

    /// Number of frames, known only for a complete table.
    pub fn frame_count(&self) -> Option<u64> {
        self.complete.then(|| self.records.len().saturating_sub(1) as u64)
    }

    /// Number of frames whose both boundaries are recorded.
    pub fn known_frames(&self) -> usize {
        self.records.len().saturating_sub(1)
    }

    /// Start and end records of frame `index`.
    pub fn frame_span(&self, index: usize) -> Option<(JumpTableRecord, JumpTableRecord)> {
        let start = self.record(index)?;
        let end = self.record(index + 1)?;
        Some((start, end))
    }

    /// True when some recorded frame contains uncompressed offset `pos`.
    pub fn covers(&self, pos: u64) -> bool {
        self.records.len() >= 2 && pos < self.last_known_uncompressed_offset()
    }

    /// Greatest record whose uncompressed position is `<= pos`, with its index.
    ///
    /// Returns `None` only for an empty table.
    pub fn find_floor(&self, pos: u64) -> Option<(usize, JumpTableRecord)> {
        let idx = self
            .records
            .partition_point(|r| r.uncompressed_pos <= pos)
            .checked_sub(1)?;
        Some((idx, self.records[idx]))
    }
}
