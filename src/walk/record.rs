//! Packed walk record: `source:24 | current:26 | hop:14` in a single `u64`.
//!
//! Layout:
//!   bit 63           40 39            14 13      0
//!   |  source (24)    | current (26)    | hop (14) |
//!
//! All operations are bitwise and allocation-free, matching the original
//! engine's `WalkManager::encode`/`getSourceId`/`getCurrentId`/`getHop`.

use crate::error::GraphWalkerError;
use crate::types::{HopCount, SourceId, VertexId, MAX_HOP, MAX_LOCAL_OFFSET, MAX_SOURCE};

const SOURCE_SHIFT: u32 = 40;
const CURRENT_SHIFT: u32 = 14;
const SOURCE_MASK: u64 = 0xff_ffff;
const CURRENT_MASK: u64 = 0x3ff_ffff;
const HOP_MASK: u64 = 0x3fff;

/// A packed walk record. Opaque outside this module; use the accessors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalkRecord(u64);

impl WalkRecord {
    /// Encode `(source, current, hop)` into a packed record.
    ///
    /// # Errors
    /// Returns `OverflowEncoding` if any field exceeds its bit width. This is
    /// checked eagerly at seed time: a wide graph or source set must fail
    /// loudly rather than silently truncate.
    pub fn encode(source: SourceId, current: VertexId, hop: HopCount) -> Result<Self, GraphWalkerError> {
        if source > MAX_SOURCE {
            return Err(GraphWalkerError::OverflowEncoding(format!(
                "source id {} exceeds 24-bit width (max {})",
                source, MAX_SOURCE
            )));
        }
        if current > MAX_LOCAL_OFFSET {
            return Err(GraphWalkerError::OverflowEncoding(format!(
                "local vertex offset {} exceeds 26-bit width (max {})",
                current, MAX_LOCAL_OFFSET
            )));
        }
        if hop > MAX_HOP {
            return Err(GraphWalkerError::OverflowEncoding(format!(
                "hop counter {} exceeds 14-bit width (max {})",
                hop, MAX_HOP
            )));
        }
        Ok(Self::encode_unchecked(source, current, hop))
    }

    /// Encode without bounds checks. Callers must have validated the fields
    /// already (e.g. `rebase`, which reuses a previously-valid source/hop).
    pub(crate) fn encode_unchecked(source: SourceId, current: VertexId, hop: HopCount) -> Self {
        let packed = ((source as u64 & SOURCE_MASK) << SOURCE_SHIFT)
            | ((current as u64 & CURRENT_MASK) << CURRENT_SHIFT)
            | (hop as u64 & HOP_MASK);
        WalkRecord(packed)
    }

    #[inline]
    pub fn source(self) -> SourceId {
        ((self.0 >> SOURCE_SHIFT) & SOURCE_MASK) as SourceId
    }

    #[inline]
    pub fn current(self) -> VertexId {
        ((self.0 >> CURRENT_SHIFT) & CURRENT_MASK) as VertexId
    }

    #[inline]
    pub fn hop(self) -> HopCount {
        (self.0 & HOP_MASK) as HopCount
    }

    /// Replace `current`, preserving `source` and `hop`. Used whenever a walk
    /// is handed to a different block and its local offset is re-based.
    pub fn rebase(self, new_current: VertexId) -> Result<Self, GraphWalkerError> {
        Self::encode(self.source(), new_current, self.hop())
    }

    /// Advance the hop counter by one, preserving `source` and `current`.
    pub fn with_next_hop(self) -> Result<Self, GraphWalkerError> {
        Self::encode(self.source(), self.current(), self.hop() + 1)
    }

    /// Raw wire representation (native byte order; see on-disk layout).
    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub fn from_bits(bits: u64) -> Self {
        WalkRecord(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_law() {
        // decode(encode(s, c, h)) == (s, c, h) for all s<2^24, c<2^26, h<2^14 (sampled).
        let cases = [
            (0u32, 0u32, 0u16),
            (MAX_SOURCE, MAX_LOCAL_OFFSET, MAX_HOP),
            (12345, 987654, 17),
            (1, 1, 1),
        ];
        for (s, c, h) in cases {
            let rec = WalkRecord::encode(s, c, h).unwrap();
            assert_eq!(rec.source(), s);
            assert_eq!(rec.current(), c);
            assert_eq!(rec.hop(), h);
        }
    }

    #[test]
    fn rebase_preserves_source_and_hop() {
        let rec = WalkRecord::encode(42, 100, 7).unwrap();
        let rebased = rec.rebase(999).unwrap();
        assert_eq!(rebased.source(), 42);
        assert_eq!(rebased.hop(), 7);
        assert_eq!(rebased.current(), 999);
    }

    #[test]
    fn encode_rejects_overflowing_fields() {
        assert!(WalkRecord::encode(MAX_SOURCE + 1, 0, 0).is_err());
        assert!(WalkRecord::encode(0, MAX_LOCAL_OFFSET + 1, 0).is_err());
        assert!(WalkRecord::encode(0, 0, MAX_HOP + 1).is_err());
    }

    #[test]
    fn with_next_hop_increments_only_hop() {
        let rec = WalkRecord::encode(5, 10, 3).unwrap();
        let advanced = rec.with_next_hop().unwrap();
        assert_eq!(advanced.source(), 5);
        assert_eq!(advanced.current(), 10);
        assert_eq!(advanced.hop(), 4);
    }
}
