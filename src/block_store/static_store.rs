//! Static block store: read-only CSR blocks built once by `build_from_edges`
//! (the minimal stand-in for the out-of-scope sharding preprocessor) and
//! read back by `load_block`/`neighbours`.
//!
//! Grounded on `original_source/src/engine/dynamicgraph.hpp`'s
//! `loadSubGraphCSR`/`loadBegpos`/`loadCSR` (the read path a static store
//! shares with the dynamic one), rewritten as plain `File::read_exact` calls
//! at explicit offsets (`pread`'s moral equivalent) rather than hand-managed
//! `malloc`/`free` pairs.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::block_store::Csr;
use crate::engine::adapter::BlockLookup;
use crate::engine::driver::EngineBlockStore;
use crate::error::{GraphWalkerError, Result};
use crate::types::{BlockId, EdgeId, VertexId};

fn block_basename(dir: &Path, start: VertexId) -> PathBuf {
    dir.join(format!("block_{}", start))
}

/// Read-only partition of `[0, V)` into contiguous CSR blocks.
pub struct StaticBlockStore {
    dir: PathBuf,
    /// Sorted vertex boundaries, length `nblocks + 1`: block `p` spans
    /// `[boundaries[p], boundaries[p+1])`.
    boundaries: Vec<VertexId>,
}

impl StaticBlockStore {
    /// Open an already-built store given its boundary list (as written by
    /// `build_from_edges`, or supplied directly by a caller that built blocks
    /// another way).
    pub fn open(dir: impl Into<PathBuf>, boundaries: Vec<VertexId>) -> Self {
        StaticBlockStore { dir: dir.into(), boundaries }
    }

    pub fn num_blocks(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        (self.boundaries[p as usize], self.boundaries[p as usize + 1])
    }

    pub fn block_of_vertex(&self, v: VertexId) -> BlockId {
        let idx = self.boundaries.partition_point(|&b| b <= v);
        (idx - 1) as BlockId
    }

    /// Load block `p`'s CSR with exactly two sequential reads: `beg_pos`
    /// first (to learn `n_p`/`m_p`), then `m_p` destination ids from `.csr`.
    pub fn load_block(&self, p: BlockId) -> Result<Csr> {
        let (lo, hi) = self.range(p);
        let n = (hi - lo) as usize;
        let base = block_basename(&self.dir, lo);

        let beg_path = base.with_extension("beg_pos");
        let mut beg_file = File::open(&beg_path)
            .map_err(|_| GraphWalkerError::MissingFile(beg_path.display().to_string()))?;
        let mut beg_bytes = Vec::with_capacity((n + 1) * 8);
        beg_file.read_to_end(&mut beg_bytes)?;
        if beg_bytes.len() != (n + 1) * 8 {
            return Err(GraphWalkerError::Corrupt(format!(
                "{} has {} bytes, expected {}",
                beg_path.display(),
                beg_bytes.len(),
                (n + 1) * 8
            )));
        }
        let beg_pos: Vec<EdgeId> = beg_bytes
            .chunks_exact(8)
            .map(|c| EdgeId::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let m = beg_pos[n] as usize;

        let csr_path = base.with_extension("csr");
        let csr = if m == 0 {
            Vec::new()
        } else {
            let mut csr_file = File::open(&csr_path)
                .map_err(|_| GraphWalkerError::MissingFile(csr_path.display().to_string()))?;
            let mut csr_bytes = Vec::with_capacity(m * 4);
            csr_file.read_to_end(&mut csr_bytes)?;
            if csr_bytes.len() != m * 4 {
                return Err(GraphWalkerError::Corrupt(format!(
                    "{} has {} bytes, expected {}",
                    csr_path.display(),
                    csr_bytes.len(),
                    m * 4
                )));
            }
            csr_bytes
                .chunks_exact(4)
                .map(|c| VertexId::from_le_bytes(c.try_into().unwrap()))
                .collect()
        };

        let built = Csr { beg_pos, csr };
        built.validate()?;
        Ok(built)
    }

    /// Out-of-driver read path: two short reads (one `beg_pos` entry pair,
    /// one slice of `.csr`). A missing `.beg_pos` file yields an empty
    /// neighbour list rather than an error.
    pub fn neighbours(&self, v: VertexId) -> Result<Vec<VertexId>> {
        let p = self.block_of_vertex(v);
        let (lo, _) = self.range(p);
        let off = (v - lo) as u64;
        let base = block_basename(&self.dir, lo);

        let beg_path = base.with_extension("beg_pos");
        let mut beg_file = match File::open(&beg_path) {
            Ok(f) => f,
            Err(_) => return Ok(Vec::new()),
        };
        beg_file.seek(SeekFrom::Start(off * 8))?;
        let mut pair = [0u8; 16];
        let read = beg_file.read(&mut pair)?;
        if read < 16 {
            return Ok(Vec::new());
        }
        let start = EdgeId::from_le_bytes(pair[0..8].try_into().unwrap());
        let end = EdgeId::from_le_bytes(pair[8..16].try_into().unwrap());
        if end <= start {
            return Ok(Vec::new());
        }
        let n = (end - start) as usize;

        let csr_path = base.with_extension("csr");
        let mut csr_file = File::open(&csr_path)
            .map_err(|_| GraphWalkerError::MissingFile(csr_path.display().to_string()))?;
        csr_file.seek(SeekFrom::Start(start * 4))?;
        let mut bytes = vec![0u8; n * 4];
        csr_file.read_exact(&mut bytes)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| VertexId::from_le_bytes(c.try_into().unwrap()))
            .collect())
    }

    pub fn boundaries(&self) -> &[VertexId] {
        &self.boundaries
    }
}

/// Build a static store from a plain-text edge list (`src dst` per line),
/// partitioning vertices into contiguous blocks sized to `blocksize` bytes
/// of CSR. This is the minimal stand-in for the out-of-scope sharding
/// preprocessor: enough to exercise the engine end to end, not
/// a general ingestion pipeline.
pub fn build_from_edges(
    dir: impl AsRef<Path>,
    edges_path: impl AsRef<Path>,
    blocksize: usize,
) -> Result<StaticBlockStore> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let text = fs::read_to_string(edges_path.as_ref())?;
    let mut adjacency: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
    let mut max_v: VertexId = 0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut it = line.split_whitespace();
        let s: VertexId = it
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| GraphWalkerError::Corrupt(format!("bad edge line: {}", line)))?;
        let t: VertexId = it
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| GraphWalkerError::Corrupt(format!("bad edge line: {}", line)))?;
        adjacency.entry(s).or_default().push(t);
        max_v = max_v.max(s).max(t);
    }
    let nverts = (max_v + 1) as usize;

    // Partition [0, nverts) into contiguous blocks whose CSR stays under
    // `blocksize` bytes, same greedy accumulation the dynamic store's split
    // step performs on an already-materialised beg_pos (here done up front
    // since the whole edge list is known).
    let mut boundaries = vec![0u32];
    let mut block_start = 0u32;
    let mut block_bytes = 0usize;
    for v in 0..nverts as u32 {
        let deg = adjacency.get(&v).map(Vec::len).unwrap_or(0);
        let deg_bytes = deg * 4;
        if block_bytes > 0 && block_bytes + deg_bytes > blocksize && v > block_start {
            boundaries.push(v);
            block_start = v;
            block_bytes = 0;
        }
        block_bytes += deg_bytes;
    }
    boundaries.push(nverts as u32);
    // A run of consecutive zero-degree vertices can produce a duplicate
    // final boundary equal to the previous one; drop it.
    boundaries.dedup();

    for w in boundaries.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        let mut beg_pos: Vec<EdgeId> = Vec::with_capacity((hi - lo) as usize + 1);
        let mut csr: Vec<VertexId> = Vec::new();
        beg_pos.push(0);
        for v in lo..hi {
            if let Some(neigh) = adjacency.get(&v) {
                csr.extend_from_slice(neigh);
            }
            beg_pos.push(csr.len() as EdgeId);
        }
        write_block(dir, lo, &beg_pos, &csr)?;
    }

    Ok(StaticBlockStore::open(dir, boundaries))
}

fn write_block(dir: &Path, start: VertexId, beg_pos: &[EdgeId], csr: &[VertexId]) -> Result<()> {
    let base = block_basename(dir, start);
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

impl BlockLookup for StaticBlockStore {
    fn block_of_vertex(&self, v: VertexId) -> BlockId {
        StaticBlockStore::block_of_vertex(self, v)
    }

    fn range(&self, p: BlockId) -> (VertexId, VertexId) {
        StaticBlockStore::range(self, p)
    }
}

impl EngineBlockStore for StaticBlockStore {
    fn num_blocks(&self) -> usize {
        StaticBlockStore::num_blocks(self)
    }

    fn load_block(&self, p: BlockId) -> Result<Csr> {
        StaticBlockStore::load_block(self, p)
    }
}
