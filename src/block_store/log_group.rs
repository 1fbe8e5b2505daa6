//! Log group: a fixed-width vertex range's append-only edge log, grounded on
//! `original_source/src/engine/dynamicgraph.hpp`'s `glogs`/`nglogs`/`writeLog`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::block_store::bitmap::Bitmap;
use crate::error::Result;
use crate::types::{GroupId, VertexId};

fn log_path(dir: &Path, group: GroupId) -> PathBuf {
    dir.join(format!("log_{}.log", group))
}

/// One log group's in-memory staging buffer plus its on-disk `.log` file and
/// membership bitmap.
pub struct LogGroup {
    pub id: GroupId,
    path: PathBuf,
    /// Staged `(src_local, dst)` pairs not yet appended to disk.
    staged: Vec<(VertexId, VertexId)>,
    capacity: usize,
    pub bitmap: Bitmap,
    /// Total bytes appended to the on-disk `.log` file (both entries are
    /// `u32`s, 8 bytes per pair).
    pub disk_bytes: usize,
}

impl LogGroup {
    pub fn new(dir: &Path, id: GroupId, nverts: usize, capacity: usize) -> Self {
        LogGroup {
            id,
            path: log_path(dir, id),
            staged: Vec::with_capacity(capacity),
            capacity,
            bitmap: Bitmap::new(nverts),
            disk_bytes: 0,
        }
    }

    /// Record one edge; returns `true` if the staging buffer just reached
    /// capacity and must be appended to disk by the caller (which also
    /// decides whether the resulting file size triggers compaction).
    pub fn stage(&mut self, src_local: VertexId, dst: VertexId, local_mask_bit: u32) -> bool {
        self.staged.push((src_local, dst));
        self.bitmap.set(local_mask_bit);
        self.staged.len() >= self.capacity
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Append the staged buffer to the on-disk log file and clear it.
    /// Returns the post-append file size in bytes.
    pub fn flush_to_disk(&mut self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(self.disk_bytes);
        }
        let mut bytes = Vec::with_capacity(self.staged.len() * 8);
        for (s, t) in &self.staged {
            bytes.extend_from_slice(&s.to_le_bytes());
            bytes.extend_from_slice(&t.to_le_bytes());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(&bytes)?;
        self.disk_bytes += bytes.len();
        self.staged.clear();
        Ok(self.disk_bytes)
    }

    /// Read every `(src_local, dst)` pair logged for this group, on disk and
    /// staged, in append order.
    pub fn read_all(&self) -> Result<Vec<(VertexId, VertexId)>> {
        let mut out = Vec::new();
        if let Ok(mut f) = File::open(&self.path) {
            let mut bytes = Vec::new();
            f.read_to_end(&mut bytes)?;
            for chunk in bytes.chunks_exact(8) {
                let s = VertexId::from_le_bytes(chunk[0..4].try_into().unwrap());
                let t = VertexId::from_le_bytes(chunk[4..8].try_into().unwrap());
                out.push((s, t));
            }
        }
        out.extend(self.staged.iter().copied());
        Ok(out)
    }

    /// Scan for edges sourced at local vertex `v_local`, if the bitmap says
    /// this group has any (used by `get_neighbours`'s read path).
    pub fn neighbours_of(&self, v_local: VertexId) -> Result<Vec<VertexId>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|(s, _)| *s == v_local)
            .map(|(_, t)| t)
            .collect())
    }

    /// Delete the on-disk log file and reset the bitmap and byte counter.
    /// Called after a successful compaction folds this group into CSR.
    pub fn consume(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.disk_bytes = 0;
        self.bitmap.reset();
        self.staged.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_flush_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = LogGroup::new(dir.path(), 0, 64, 2);
        assert!(!g.stage(3, 10, 3));
        assert!(g.stage(5, 11, 5));
        g.flush_to_disk().unwrap();
        let all = g.read_all().unwrap();
        assert_eq!(all, vec![(3, 10), (5, 11)]);
        assert!(g.bitmap.get(3));
        assert!(g.bitmap.get(5));
    }

    #[test]
    fn consume_removes_file_and_resets_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = LogGroup::new(dir.path(), 1, 64, 4);
        g.stage(1, 2, 1);
        g.flush_to_disk().unwrap();
        g.consume().unwrap();
        assert!(g.read_all().unwrap().is_empty());
        assert!(!g.bitmap.get(1));
    }
}
