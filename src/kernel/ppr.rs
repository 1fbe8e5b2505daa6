//! Personalized PageRank demo kernel: the minimal, real instance of an
//! application adapter that exercises the engine end to end.
//!
//! Grounded on `original_source/apps/ppr.cpp`'s `PersonalizedPageRank`
//! (`initializeApp`/`startWalksbyApp`/`updateInfo`) composed with
//! `randomwalkwithrestartwithjoint.hpp`'s restart/stop policy: each hop
//! visits the current vertex, then with probability `restart_prob` jumps
//! back to the walk's own source, otherwise samples uniformly among
//! out-neighbours (falling back to a restart on a dead end).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::block_store::Csr;
use crate::config::Config;
use crate::engine::adapter::{AdvanceContext, ApplicationKernel, BlockLookup};
use crate::error::Result;
use crate::types::{BlockId, HopCount, SourceId, ThreadId, VertexId};
use crate::walk::manager::WalkManager;
use crate::walk::record::WalkRecord;

/// Per-vertex visit counters, stored as `u32` end to end (never reinterpreted
/// as `f32` in place) —
/// the original's `sizeof(unsigned) * len` / `sizeof(float) * len` mismatch
/// cannot arise here because no pointer cast ever occurs.
pub struct PersonalizedPageRank<L> {
    lookup: Arc<L>,
    first_source: VertexId,
    num_sources: u32,
    walks_per_source: u32,
    max_walk_length: HopCount,
    restart_prob: f64,
    visit_counts: Vec<AtomicU32>,
}

impl<L: BlockLookup> PersonalizedPageRank<L> {
    pub fn new(lookup: Arc<L>, n_verts: usize, config: &Config, restart_prob: f64) -> Self {
        PersonalizedPageRank {
            lookup,
            first_source: config.first_source,
            num_sources: config.num_sources,
            walks_per_source: config.walks_per_source,
            max_walk_length: config.max_walk_length,
            restart_prob,
            visit_counts: (0..n_verts).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Snapshot of visit counts in vertex order. Application-owned state;
    /// the core makes no assumptions about its layout.
    pub fn visit_counts(&self) -> Vec<u32> {
        self.visit_counts.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// Visit probability per vertex, computed as a separate `f32` pass
    /// (never in place over the `u32` counters).
    pub fn visit_probabilities(&self) -> Vec<f32> {
        let counts = self.visit_counts();
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return vec![0.0; counts.len()];
        }
        counts.iter().map(|&c| c as f32 / total as f32).collect()
    }

    fn source_vertex(&self, source_id: SourceId) -> VertexId {
        self.first_source + source_id
    }
}

impl<L: BlockLookup> ApplicationKernel for PersonalizedPageRank<L> {
    fn seed_walks(&self, manager: &mut WalkManager) -> Result<()> {
        for i in 0..self.num_sources {
            let s = self.source_vertex(i);
            let p = self.lookup.block_of_vertex(s);
            let (lo, _) = self.lookup.range(p);
            let local = s - lo;
            for _ in 0..self.walks_per_source {
                manager.seed(i, p, local)?;
            }
        }
        Ok(())
    }

    fn advance(
        &self,
        record: WalkRecord,
        _p: BlockId,
        lo: VertexId,
        hi: VertexId,
        csr: &Csr,
        ctx: &mut AdvanceContext,
    ) -> Result<()> {
        let source = record.source();
        let mut local = record.current();
        let mut hop = record.hop();
        let mut rng = rand::thread_rng();

        loop {
            self.visit(source, lo + local, ctx.thread_id, hop);

            if hop + 1 >= self.max_walk_length {
                return Ok(());
            }

            let restart = rng.gen::<f64>() < self.restart_prob;
            let neighbours = csr.neighbours(local);
            let next_global = if restart || neighbours.is_empty() {
                self.source_vertex(source)
            } else {
                neighbours[rng.gen_range(0..neighbours.len())]
            };
            hop += 1;

            if next_global >= lo && next_global < hi {
                local = next_global - lo;
                continue;
            }

            let moving = WalkRecord::encode(source, local, hop)?;
            let new_block = ctx.block_of_vertex(next_global);
            let (new_lo, _) = ctx.range(new_block);
            ctx.move_walk(moving, new_block, next_global - new_lo)?;
            ctx.set_min_hop(new_block, hop);
            return Ok(());
        }
    }

    fn visit(&self, _source_id: SourceId, vertex_id: VertexId, _thread_id: ThreadId, _hop: HopCount) {
        self.visit_counts[vertex_id as usize].fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_store::static_store::{build_from_edges, StaticBlockStore};
    use crate::walk::manager::WalkManager;

    fn single_block_triangle(dir: &std::path::Path) -> StaticBlockStore {
        let edges = dir.join("edges.txt");
        std::fs::write(&edges, "0 1\n1 2\n2 0\n").unwrap();
        build_from_edges(dir.join("store"), &edges, 1 << 20).unwrap()
    }

    #[test]
    fn zero_hop_walk_visits_only_source() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(single_block_triangle(tmp.path()));
        let mut config = Config::default();
        config.max_walk_length = 0;
        config.num_sources = 1;
        config.walks_per_source = 1;
        let kernel = PersonalizedPageRank::new(store.clone(), 3, &config, 0.0);

        let walks_dir = tmp.path().join("walks");
        let mut manager = WalkManager::new(&walks_dir, 1, store.num_blocks(), 16).unwrap();
        kernel.seed_walks(&mut manager).unwrap();
        let csr = store.load_block(0).unwrap();
        let mut records = manager.snapshot_walks(0).unwrap();
        let min_hop = crate::walk::manager::MinHopTable::from_manager(&manager);
        let rows = manager.thread_rows_mut();
        let mut ctx = AdvanceContext::new(0, &mut rows[0], &min_hop, store.as_ref());
        for r in records.drain(..) {
            kernel.advance(r, 0, 0, 3, &csr, &mut ctx).unwrap();
        }

        let counts = kernel.visit_counts();
        assert_eq!(counts, vec![1, 0, 0]);
    }

    #[test]
    fn self_loop_single_vertex_gets_l_visits_per_walk() {
        let tmp = tempfile::tempdir().unwrap();
        let edges = tmp.path().join("edges.txt");
        std::fs::write(&edges, "0 0\n").unwrap();
        let store = Arc::new(build_from_edges(tmp.path().join("store"), &edges, 1 << 20).unwrap());

        let mut config = Config::default();
        config.max_walk_length = 5;
        config.num_sources = 1;
        config.walks_per_source = 1;
        let kernel = PersonalizedPageRank::new(store.clone(), 1, &config, 0.0);

        let walks_dir = tmp.path().join("walks");
        let mut manager = WalkManager::new(&walks_dir, 1, store.num_blocks(), 16).unwrap();
        kernel.seed_walks(&mut manager).unwrap();
        let csr = store.load_block(0).unwrap();
        let mut records = manager.snapshot_walks(0).unwrap();
        let min_hop = crate::walk::manager::MinHopTable::from_manager(&manager);
        let rows = manager.thread_rows_mut();
        let mut ctx = AdvanceContext::new(0, &mut rows[0], &min_hop, store.as_ref());
        for r in records.drain(..) {
            kernel.advance(r, 0, 0, 1, &csr, &mut ctx).unwrap();
        }

        // hop goes 0,1,2,3,4 before hop==L=5 stops it: 5 visits, all to vertex 0.
        assert_eq!(kernel.visit_counts(), vec![5]);
    }
}
