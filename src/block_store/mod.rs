//! Block store: maps block ids to on-disk CSR, read directly (static) or
//! backed by append-only per-group edge logs with background compaction
//! (dynamic). Grounded on `original_source/src/engine/staticgraph.hpp` and
//! `dynamicgraph.hpp`.

pub mod bitmap;
pub mod dynamic_store;
pub mod log_group;
pub mod static_store;

use crate::types::{BlockId, EdgeId, VertexId};

/// One block's CSR pair, loaded fully into memory for the duration of a
/// driver iteration. `beg_pos[v]..beg_pos[v+1]` indexes into `csr` for the
/// out-neighbours of local vertex `v`.
#[derive(Clone, Debug, Default)]
pub struct Csr {
    pub beg_pos: Vec<EdgeId>,
    pub csr: Vec<VertexId>,
}

impl Csr {
    pub fn n_verts(&self) -> usize {
        self.beg_pos.len().saturating_sub(1)
    }

    pub fn n_edges(&self) -> usize {
        self.csr.len()
    }

    /// Out-neighbours of local vertex `v`. Empty slice if `v` is out of range
    /// or has no edges.
    pub fn neighbours(&self, v: VertexId) -> &[VertexId] {
        let v = v as usize;
        if v + 1 >= self.beg_pos.len() {
            return &[];
        }
        let lo = self.beg_pos[v] as usize;
        let hi = self.beg_pos[v + 1] as usize;
        &self.csr[lo..hi]
    }

    /// Checked construction: validates the CSR invariants (`beg_pos`
    /// non-decreasing, `beg_pos[n] == csr.len()`).
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::GraphWalkerError;
        if self.beg_pos.is_empty() {
            return Ok(());
        }
        for w in self.beg_pos.windows(2) {
            if w[1] < w[0] {
                return Err(GraphWalkerError::Corrupt(
                    "beg_pos is not non-decreasing".into(),
                ));
            }
        }
        let last = *self.beg_pos.last().unwrap();
        if last as usize != self.csr.len() {
            return Err(GraphWalkerError::Corrupt(format!(
                "beg_pos[n] = {} does not match csr length {}",
                last,
                self.csr.len()
            )));
        }
        Ok(())
    }
}

/// One half-open `[lo, hi)` block boundary, in absolute vertex ids, derived
/// from `blocks[]` (a sorted list of group boundaries) and the group shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRange {
    pub block: BlockId,
    pub lo: VertexId,
    pub hi: VertexId,
}
