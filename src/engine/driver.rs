//! Execution driver: the load-one-block loop, and the parallel advance of
//! every walk in that block's snapshot.
//!
//! Grounded on `original_source/apps/ppr.cpp`'s `engine.run(program, prob)`
//! entry point and the main-loop shape of `original_source`'s (unseen, but
//! implied by `graphwalker_engine`) interval loop, with dispatch style
//! borrowed from `delta::algorithm::diff`'s single dispatch function.

use log::{debug, info};
use rayon::prelude::*;

use crate::block_store::Csr;
use crate::config::Config;
use crate::engine::adapter::{AdvanceContext, ApplicationKernel, BlockLookup};
use crate::error::Result;
use crate::types::BlockId;
use crate::walk::manager::{MinHopTable, WalkManager};
use crate::walk::record::WalkRecord;

/// What the driver needs from a block store: CSR loading plus the
/// `BlockLookup` contract the kernel uses to resolve cross-block moves.
pub trait EngineBlockStore: BlockLookup {
    fn num_blocks(&self) -> usize;
    fn load_block(&self, p: BlockId) -> Result<Csr>;
}

impl<T: EngineBlockStore + ?Sized> EngineBlockStore for std::sync::Arc<T> {
    fn num_blocks(&self) -> usize {
        (**self).num_blocks()
    }

    fn load_block(&self, p: BlockId) -> Result<Csr> {
        (**self).load_block(p)
    }
}

/// Ties a block store, the walk manager, and a kernel together and runs the
/// load-one-block loop to completion, keeping exactly one block's CSR
/// resident while guaranteeing forward progress every pass.
pub struct Engine<S, K> {
    store: S,
    manager: WalkManager,
    kernel: K,
    config: Config,
    pool: rayon::ThreadPool,
}

impl<S: EngineBlockStore, K: ApplicationKernel> Engine<S, K> {
    pub fn new(store: S, manager: WalkManager, kernel: K, config: Config) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.exec_threads)
            .build()
            .map_err(|e| crate::error::GraphWalkerError::ConfigInvalid(e.to_string()))?;
        Ok(Engine { store, manager, kernel, config, pool })
    }

    pub fn manager(&self) -> &WalkManager {
        &self.manager
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Run to completion: seed, then repeatedly pick a block, load it,
    /// advance every walk currently bucketed there, and clear it, until no
    /// walk remains anywhere.
    pub fn run(&mut self) -> Result<()> {
        self.kernel.seed_walks(&mut self.manager)?;
        info!("seeded walks: grand_total = {}", self.manager.grand_total);

        let mut iterations = 0u64;
        while self.manager.grand_total > 0 {
            let p = self
                .manager
                .choose_block(self.config.policy)
                .expect("grand_total > 0 implies some block is non-empty");
            let (lo, hi) = self.store.range(p);

            self.kernel.before_block(p, lo, hi, &self.manager);
            let csr = self.store.load_block(p)?;
            let mut records = self.manager.snapshot_walks(p)?;
            debug!(
                "block {} [{}, {}): {} walks, {} resident vertices",
                p,
                lo,
                hi,
                records.len(),
                csr.n_verts()
            );

            self.advance_all(p, lo, hi, &csr, &mut records)?;

            self.kernel.after_block(p, lo, hi, &self.manager);
            self.manager.clear_block(p);
            iterations += 1;
        }
        info!("run complete in {} block iterations", iterations);
        Ok(())
    }

    /// Statically chunk `records` across `execthreads` threads; each thread
    /// owns its bucket row exclusively for the duration: no work is done
    /// on other blocks concurrently, and records are split statically
    /// across threads.
    fn advance_all(
        &mut self,
        p: BlockId,
        lo: u32,
        hi: u32,
        csr: &Csr,
        records: &mut [WalkRecord],
    ) -> Result<()> {
        let min_hop_table = MinHopTable::from_manager(&self.manager);
        let nthreads = self.config.exec_threads.max(1);
        let chunk_size = records.len().div_ceil(nthreads).max(1);
        let chunks: Vec<&mut [WalkRecord]> = records.chunks_mut(chunk_size).collect();
        let rows = self.manager.thread_rows_mut();
        let kernel = &self.kernel;
        let store = &self.store;

        let result: Result<()> = self.pool.install(|| {
            rows[..chunks.len()]
                .par_iter_mut()
                .zip(chunks.into_par_iter())
                .enumerate()
                .try_for_each(|(thread_id, (row, chunk))| -> Result<()> {
                    let mut ctx = AdvanceContext::new(thread_id, row, &min_hop_table, store);
                    for &record in chunk.iter() {
                        kernel.advance(record, p, lo, hi, csr, &mut ctx)?;
                    }
                    Ok(())
                })
        });
        result?;

        min_hop_table.apply_to(&mut self.manager);
        Ok(())
    }
}
