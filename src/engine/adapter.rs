//! Application adapter: the narrow contract between the core engine and a
//! user walk kernel. Grounded on
//! `original_source/src/walks/randomwalkwithrestartwithjoint.hpp`'s
//! `before_exec_interval`/`after_exec_interval`/`updateInfo` method slots,
//! modelled here as trait methods on a capability object rather than a base
//! class: polymorphism is on the capability set, not a type hierarchy.

use crate::block_store::Csr;
use crate::error::Result;
use crate::types::{BlockId, HopCount, SourceId, ThreadId, VertexId};
use crate::walk::bucket::WalkBucket;
use crate::walk::manager::{MinHopTable, WalkManager};
use crate::walk::record::WalkRecord;

/// Anything that can answer "which block owns vertex `v`, and what is block
/// `p`'s vertex range". Implemented by both block store variants so a
/// kernel's `advance` can decide whether a sampled next vertex stays in the
/// resident block or must be handed off.
pub trait BlockLookup: Sync {
    fn block_of_vertex(&self, v: VertexId) -> BlockId;
    fn range(&self, p: BlockId) -> (VertexId, VertexId);
}

impl<T: BlockLookup + ?Sized> BlockLookup for std::sync::Arc<T> {
    fn block_of_vertex(&self, v: VertexId) -> BlockId {
        (**self).block_of_vertex(v)
    }

    fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        (**self).range(p)
    }
}

/// Per-thread scratch handed to `advance`: this thread's own bucket row (so
/// cross-block moves need no lock) plus the shared, lock-guarded
/// `min_hop` table and a read-only view of the block layout.
pub struct AdvanceContext<'a> {
    pub thread_id: ThreadId,
    row: &'a mut [WalkBucket],
    min_hop: &'a MinHopTable,
    lookup: &'a dyn BlockLookup,
}

impl<'a> AdvanceContext<'a> {
    pub fn new(
        thread_id: ThreadId,
        row: &'a mut [WalkBucket],
        min_hop: &'a MinHopTable,
        lookup: &'a dyn BlockLookup,
    ) -> Self {
        AdvanceContext { thread_id, row, min_hop, lookup }
    }

    /// Rebase `record` onto `(new_block, new_local)` and push it into this
    /// thread's own bucket for `new_block` — no lock required.
    pub fn move_walk(&mut self, record: WalkRecord, new_block: BlockId, new_local: VertexId) -> Result<()> {
        let rebased = record.rebase(new_local)?;
        self.row[new_block as usize].push(rebased)
    }

    /// `min_hop[new_block] := min(min_hop[new_block], hop)`, serialized by a
    /// small scoped lock shared across every thread in this block's pass.
    pub fn set_min_hop(&self, p: BlockId, hop: HopCount) {
        self.min_hop.set_min_hop(p, hop);
    }

    pub fn block_of_vertex(&self, v: VertexId) -> BlockId {
        self.lookup.block_of_vertex(v)
    }

    pub fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        self.lookup.range(p)
    }
}

/// The user walk kernel's full contract. The core never
/// interprets `visit` data; it only guarantees the concurrency contract of
/// §5 (one thread per `AdvanceContext`, no cooperative suspension).
pub trait ApplicationKernel: Sync {
    /// Called once at engine start to populate the initial buckets.
    fn seed_walks(&self, manager: &mut WalkManager) -> Result<()>;

    /// Called once before block `p`'s advancement begins.
    fn before_block(&self, _p: BlockId, _lo: VertexId, _hi: VertexId, _manager: &WalkManager) {}

    /// Called once after block `p`'s advancement completes.
    fn after_block(&self, _p: BlockId, _lo: VertexId, _hi: VertexId, _manager: &WalkManager) {}

    /// Drive one walk until it exits block `p` or terminates. `lo`/`hi` is
    /// `p`'s vertex range, `csr` is `p`'s resident CSR. Implementations call
    /// `visit` on every hop and `ctx.move_walk`/`ctx.set_min_hop` on exit.
    fn advance(
        &self,
        record: WalkRecord,
        p: BlockId,
        lo: VertexId,
        hi: VertexId,
        csr: &Csr,
        ctx: &mut AdvanceContext,
    ) -> Result<()>;

    /// Called by `advance` on every hop. The core never interprets the
    /// data; it only guarantees every hop gets exactly one call.
    /// Concurrent calls for the same vertex across threads are the
    /// kernel's responsibility to serialize or make idempotent.
    fn visit(&self, source_id: SourceId, vertex_id: VertexId, thread_id: ThreadId, hop: HopCount);
}
