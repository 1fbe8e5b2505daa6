//! Dynamic block store: accepts streaming edge insertions into per-group
//! append-only logs, with background compaction folding a block's logs into
//! its CSR (and splitting the block if the fold grows it past `blocksize`).
//!
//! Grounded on `original_source/src/engine/dynamicgraph.hpp`
//! (`DynamicGraph::addEdge`/`flush`/`compaction`/`loadSubGraph`/
//! `splitSubGraph`/`getNeighbors`).

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::block_store::log_group::LogGroup;
use crate::block_store::Csr;
use crate::engine::adapter::BlockLookup;
use crate::engine::driver::EngineBlockStore;
use crate::error::{GraphWalkerError, Result};
use crate::types::{BlockId, EdgeId, GroupId, VertexId};

fn block_basename(dir: &Path, group_start: GroupId) -> PathBuf {
    dir.join(format!("block_{}", group_start))
}

/// Append-only, compacting block store. `blocks[]` is a sorted list of group
/// boundaries: block `p` spans groups `[blocks[p], blocks[p+1])`.
pub struct DynamicBlockStore {
    dir: PathBuf,
    blocksize: usize,
    logsize: usize,
    bufcap: usize,
    logcap: usize,
    group_shift: u32,
    nverts_per_group: u32,

    blocks: Vec<GroupId>,
    groups: Vec<LogGroup>,
    /// Live global edge buffer. Entries are `(src, dst,
    /// is_delete)`; `is_delete` is accepted but never consulted, matching
    /// the original's unresolved open question — deletions
    /// that preserve history are an explicit non-goal.
    edge_buffer: Vec<(VertexId, VertexId, bool)>,
    n_verts: VertexId,
}

impl DynamicBlockStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        blocksize: usize,
        bufcap: usize,
        nverts_per_group: u32,
        logsize: usize,
        logcap: usize,
    ) -> Result<Self> {
        if !nverts_per_group.is_power_of_two() {
            return Err(GraphWalkerError::ConfigInvalid(format!(
                "nverts_per_grp {} is not a power of two",
                nverts_per_group
            )));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let group_shift = nverts_per_group.trailing_zeros();
        let first_group = LogGroup::new(&dir, 0, nverts_per_group as usize, logcap);
        Ok(DynamicBlockStore {
            dir,
            blocksize,
            logsize,
            bufcap,
            logcap,
            group_shift,
            nverts_per_group,
            blocks: vec![0, 1],
            groups: vec![first_group],
            edge_buffer: Vec::with_capacity(bufcap),
            n_verts: 0,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len() - 1
    }

    fn group_of(&self, v: VertexId) -> GroupId {
        v >> self.group_shift
    }

    fn block_index_of_group(&self, g: GroupId) -> BlockId {
        let idx = self.blocks.partition_point(|&b| b <= g);
        (idx - 1) as BlockId
    }

    pub fn block_of_vertex(&self, v: VertexId) -> BlockId {
        self.block_index_of_group(self.group_of(v))
    }

    /// Vertex range `[lo, hi)` owned by block `p`.
    pub fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        let lo = self.blocks[p as usize] << self.group_shift;
        let hi = if p as usize + 2 == self.blocks.len() {
            self.n_verts.max(lo)
        } else {
            self.blocks[p as usize + 1] << self.group_shift
        };
        (lo, hi)
    }

    fn ensure_groups_for(&mut self, v: VertexId) {
        self.n_verts = self.n_verts.max(v + 1);
        let needed_group = self.group_of(v);
        while (self.groups.len() as u32) <= needed_group {
            let gid = self.groups.len() as GroupId;
            self.groups.push(LogGroup::new(
                &self.dir,
                gid,
                self.nverts_per_group as usize,
                self.logcap,
            ));
            *self.blocks.last_mut().unwrap() = gid + 1;
        }
    }

    /// Stage an edge in the global edge buffer. `is_delete`
    /// is accepted for interface compatibility but unused, matching the
    /// original (see module doc).
    pub fn add_edge(&mut self, s: VertexId, t: VertexId, is_delete: bool) -> Result<()> {
        self.ensure_groups_for(s.max(t));
        if self.edge_buffer.len() >= self.bufcap {
            self.flush()?;
        }
        self.edge_buffer.push((s, t, is_delete));
        Ok(())
    }

    /// Classify every buffered edge into its owning group's log, appending
    /// any group that fills (or that is touched here, mirroring the
    /// original's unconditional end-of-flush sweep) to disk, compacting a
    /// block whose log file crosses `logsize`.
    pub fn flush(&mut self) -> Result<()> {
        let buffer = std::mem::take(&mut self.edge_buffer);
        let mut touched = std::collections::BTreeSet::new();
        for (s, t, _is_delete) in &buffer {
            let g = self.group_of(*s) as usize;
            let bit = *s & (self.nverts_per_group - 1);
            let full = self.groups[g].stage(*s, *t, bit);
            touched.insert(g as GroupId);
            if full {
                self.append_group_log(g as GroupId)?;
            }
        }
        for g in touched {
            if self.groups[g as usize].staged_len() > 0 {
                self.append_group_log(g)?;
            }
        }
        Ok(())
    }

    fn append_group_log(&mut self, g: GroupId) -> Result<()> {
        let fsize = self.groups[g as usize].flush_to_disk()?;
        if fsize >= self.logsize {
            let p = self.block_index_of_group(g);
            self.compact(p)?;
        }
        Ok(())
    }

    /// Fold every log group owned by block `p` into its CSR, splitting the
    /// result across new blocks if it exceeds `blocksize`.
    pub fn compact(&mut self, p: BlockId) -> Result<()> {
        let group_start = self.blocks[p as usize];
        let group_end = self.blocks[p as usize + 1];
        let (lo, hi) = self.range(p);
        let nverts = (hi - lo) as usize;

        let existing = self.load_csr_if_present(group_start, nverts)?;
        let old_beg_pos = existing
            .as_ref()
            .map(|c| c.beg_pos.clone())
            .unwrap_or_else(|| vec![0; nverts + 1]);
        let old_csr = existing.map(|c| c.csr).unwrap_or_default();

        let mut by_vertex: Vec<Vec<VertexId>> = vec![Vec::new(); nverts];
        for g in group_start..group_end {
            for (s, t) in self.groups[g as usize].read_all()? {
                let local = (s - lo) as usize;
                if local < nverts {
                    by_vertex[local].push(t);
                }
            }
        }

        let mut new_beg_pos = vec![0u64; nverts + 1];
        let mut begoff: u64 = 0;
        for v in 0..nverts {
            begoff += by_vertex[v].len() as u64;
            new_beg_pos[v + 1] = old_beg_pos[v + 1] + begoff;
        }
        let total_edges = *new_beg_pos.last().unwrap() as usize;
        let mut new_csr = vec![0u32; total_edges];
        for v in 0..nverts {
            let old_lo = old_beg_pos[v] as usize;
            let old_hi = old_beg_pos[v + 1] as usize;
            let old_deg = old_hi - old_lo;
            let new_lo = new_beg_pos[v] as usize;
            new_csr[new_lo..new_lo + old_deg].copy_from_slice(&old_csr[old_lo..old_hi]);
            let log_start = new_lo + old_deg;
            for (i, dst) in by_vertex[v].iter().enumerate() {
                new_csr[log_start + i] = *dst;
            }
        }

        self.write_subgraph(group_start, new_beg_pos, new_csr)?;

        for g in group_start..group_end {
            self.groups[g as usize].consume()?;
        }
        Ok(())
    }

    /// Write (or, if it exceeds `blocksize` and spans multiple groups,
    /// recursively split) one compacted block's CSR. Addressed by
    /// `group_start`, a stable identifier, rather than a block index, since
    /// splitting earlier siblings shifts later indices (mirrors the
    /// original's `getBlockByGroupId` re-lookup after each recursive call).
    fn write_subgraph(
        &mut self,
        group_start: GroupId,
        beg_pos: Vec<EdgeId>,
        csr: Vec<VertexId>,
    ) -> Result<()> {
        let p = self.block_index_of_group(group_start) as usize;
        let ngroups = self.blocks[p + 1] - self.blocks[p];
        let nedges = csr.len();

        if nedges * 4 > self.blocksize && ngroups > 1 {
            let nverts = beg_pos.len() - 1;
            let target = (nedges / 2) as u64;
            let split_vertex = beg_pos.partition_point(|&b| b < target);
            let mut g = (split_vertex as u32) >> self.group_shift;
            if g == 0 {
                g = 1;
            }
            if g >= ngroups {
                g = ngroups - 1;
            }
            let nverts1 = ((g << self.group_shift) as usize).min(nverts);
            let nedges1 = beg_pos[nverts1] as usize;

            self.blocks.insert(p + 1, group_start + g);

            let low_beg = beg_pos[..=nverts1].to_vec();
            let low_csr = csr[..nedges1].to_vec();
            let high_beg: Vec<EdgeId> = beg_pos[nverts1..]
                .iter()
                .map(|&b| b - nedges1 as EdgeId)
                .collect();
            let high_csr = csr[nedges1..].to_vec();

            self.write_subgraph(group_start, low_beg, low_csr)?;
            self.write_subgraph(group_start + g, high_beg, high_csr)?;
        } else {
            self.write_block_files(group_start, &beg_pos, &csr)?;
        }
        Ok(())
    }

    fn write_block_files(&self, group_start: GroupId, beg_pos: &[EdgeId], csr: &[VertexId]) -> Result<()> {
        let base = block_basename(&self.dir, group_start);
        let mut beg_file = File::create(base.with_extension("beg_pos"))?;
        for &b in beg_pos {
            beg_file.write_all(&b.to_le_bytes())?;
        }
        let mut csr_file = File::create(base.with_extension("csr"))?;
        for &v in csr {
            csr_file.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    fn load_csr_if_present(&self, group_start: GroupId, nverts: usize) -> Result<Option<Csr>> {
        let base = block_basename(&self.dir, group_start);
        let beg_path = base.with_extension("beg_pos");
        let Ok(mut beg_file) = File::open(&beg_path) else {
            return Ok(None);
        };
        let mut beg_bytes = Vec::new();
        beg_file.read_to_end(&mut beg_bytes)?;
        let read_verts = beg_bytes.len() / 8;
        let mut beg_pos: Vec<EdgeId> = beg_bytes
            .chunks_exact(8)
            .map(|c| EdgeId::from_le_bytes(c.try_into().unwrap()))
            .collect();
        // A block grown by addVertex since it was last written has more
        // vertices than the file recorded; pad with the last known offset.
        if read_verts <= nverts {
            let pad = *beg_pos.last().unwrap_or(&0);
            beg_pos.resize(nverts + 1, pad);
        }
        let m = beg_pos[nverts] as usize;
        let csr = if m == 0 {
            Vec::new()
        } else {
            let mut csr_file = File::open(base.with_extension("csr"))?;
            let mut bytes = Vec::with_capacity(m * 4);
            csr_file.read_to_end(&mut bytes)?;
            bytes
                .chunks_exact(4)
                .map(|c| VertexId::from_le_bytes(c.try_into().unwrap()))
                .collect()
        };
        Ok(Some(Csr { beg_pos, csr }))
    }

    /// Load block `p`'s CSR for driver use. Blocks with no compacted CSR yet
    /// (pure in-log data) load as all-zero-degree.
    pub fn load_block(&self, p: BlockId) -> Result<Csr> {
        let (lo, hi) = self.range(p);
        let nverts = (hi - lo) as usize;
        match self.load_csr_if_present(self.blocks[p as usize], nverts)? {
            Some(csr) => {
                csr.validate()?;
                Ok(csr)
            }
            None => Ok(Csr {
                beg_pos: vec![0; nverts + 1],
                csr: Vec::new(),
            }),
        }
    }

    /// Union of CSR neighbours, on-disk group log (iff the group's bitmap
    /// bit is set for `v`), and the live edge buffer. Order
    /// is unspecified.
    pub fn get_neighbours(&self, v: VertexId) -> Result<Vec<VertexId>> {
        let p = self.block_of_vertex(v);
        let (lo, _) = self.range(p);
        let mut out = Vec::new();

        if let Ok(csr) = self.load_block(p) {
            out.extend_from_slice(csr.neighbours(v - lo));
        }

        let g = self.group_of(v) as usize;
        let bit = v & (self.nverts_per_group - 1);
        if self.groups[g].bitmap.get(bit) {
            out.extend(self.groups[g].neighbours_of(v)?);
        }

        for (s, t, _) in &self.edge_buffer {
            if *s == v {
                out.push(*t);
            }
        }
        Ok(out)
    }

    pub fn blocks(&self) -> &[GroupId] {
        &self.blocks
    }
}

impl BlockLookup for DynamicBlockStore {
    fn block_of_vertex(&self, v: VertexId) -> BlockId {
        DynamicBlockStore::block_of_vertex(self, v)
    }

    fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        DynamicBlockStore::range(self, p)
    }
}

impl EngineBlockStore for DynamicBlockStore {
    fn num_blocks(&self) -> usize {
        DynamicBlockStore::num_blocks(self)
    }

    fn load_block(&self, p: BlockId) -> Result<Csr> {
        DynamicBlockStore::load_block(self, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(blocksize: usize) -> (tempfile::TempDir, DynamicBlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let s = DynamicBlockStore::new(dir.path(), blocksize, 4, 8, 64, 4).unwrap();
        (dir, s)
    }

    #[test]
    fn add_edges_flush_and_read_back_via_get_neighbours() {
        let (_dir, mut s) = store(1 << 20);
        s.add_edge(0, 1, false).unwrap();
        s.add_edge(0, 2, false).unwrap();
        s.add_edge(1, 3, false).unwrap();
        s.flush().unwrap();
        let mut n0 = s.get_neighbours(0).unwrap();
        n0.sort();
        assert_eq!(n0, vec![1, 2]);
        assert_eq!(s.get_neighbours(1).unwrap(), vec![3]);
    }

    #[test]
    fn get_neighbours_sees_live_buffer_before_flush() {
        let (_dir, mut s) = store(1 << 20);
        s.add_edge(0, 5, false).unwrap();
        assert_eq!(s.get_neighbours(0).unwrap(), vec![5]);
    }

    #[test]
    fn compaction_preserves_edge_count_and_monotonic_beg_pos() {
        let (_dir, mut s) = store(1 << 20);
        for i in 0..20u32 {
            s.add_edge(0, i + 1, false).unwrap();
        }
        s.flush().unwrap();
        s.compact(0).unwrap();
        let csr = s.load_block(0).unwrap();
        csr.validate().unwrap();
        assert_eq!(csr.n_edges(), 20);
        let mut got: Vec<u32> = csr.neighbours(0).to_vec();
        got.sort();
        assert_eq!(got, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn forced_small_blocksize_splits_block() {
        // nverts_per_grp=8, so growing past vertex 16 forces >1 group, and a
        // tiny blocksize (in bytes) forces the compacted CSR to split.
        let (_dir, mut s) = store(16);
        for v in 0..24u32 {
            for off in 1..=3u32 {
                s.add_edge(v, (v + off) % 24, false).unwrap();
            }
        }
        s.flush().unwrap();
        for p in 0..s.num_blocks() as u32 {
            s.compact(p).unwrap();
        }
        assert!(s.num_blocks() >= 1);
        for p in 0..s.num_blocks() as u32 {
            let csr = s.load_block(p).unwrap();
            csr.validate().unwrap();
            let (lo, hi) = s.range(p);
            assert!(csr.n_edges() * 4 <= 16 || hi - lo <= s.nverts_per_group);
        }
    }

    /// Seeds enough random edges to force at least one compaction and one
    /// split, then checks that `get_neighbours` over 100 random vertices
    /// returns exactly the multiset of destinations added for that source
    /// (property 7/S5): the union of CSR + on-disk log + live buffer must
    /// equal the `add_edge` history regardless of how many times a vertex's
    /// block has since been compacted or split.
    #[test]
    fn random_edges_survive_compaction_and_split_with_correct_neighbours() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let dir = tempfile::tempdir().unwrap();
        let mut s = DynamicBlockStore::new(dir.path(), 64, 8, 8, 128, 8).unwrap();
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let nverts = 64u32;
        let mut expected: std::collections::HashMap<u32, Vec<u32>> = std::collections::HashMap::new();

        for i in 0..3_000u32 {
            let src = rng.gen_range(0..nverts);
            let dst = rng.gen_range(0..nverts);
            s.add_edge(src, dst, false).unwrap();
            expected.entry(src).or_default().push(dst);
            if i % 37 == 0 {
                s.flush().unwrap();
            }
        }
        s.flush().unwrap();

        // Compact every block repeatedly until no block count growth is
        // observed, since a split can shift later block indices mid-sweep.
        loop {
            let before = s.num_blocks();
            for p in 0..s.num_blocks() as u32 {
                s.compact(p).unwrap();
            }
            if s.num_blocks() == before {
                break;
            }
        }
        assert!(s.num_blocks() > 1, "this many edges into a 64-byte blocksize must force a split");

        for p in 0..s.num_blocks() as u32 {
            let csr = s.load_block(p).unwrap();
            csr.validate().unwrap();
            let (lo, hi) = s.range(p);
            assert!(csr.n_edges() * 4 <= 64 || hi - lo <= s.nverts_per_group);
        }

        for _ in 0..100 {
            let v = rng.gen_range(0..nverts);
            let mut got = s.get_neighbours(v).unwrap();
            got.sort_unstable();
            let mut want = expected.get(&v).cloned().unwrap_or_default();
            want.sort_unstable();
            assert_eq!(got, want, "neighbours of {} must match add_edge history", v);
        }
    }
}
