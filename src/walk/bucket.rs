//! Walk buckets: a fixed-capacity, append-only in-memory queue per
//! `(thread, block)` pair, with overflow spilled to a per-block `.walks` file.
//!
//! Grounded on `original_source/src/walks/walk.hpp`'s `WalkBuffer` /
//! `writeWalks2Disk` / `readWalksfromDisk`, rewritten as an owning Rust type
//! instead of a raw `vid_t*` the caller must size and free by hand.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{GraphWalkerError, Result};
use crate::walk::record::WalkRecord;

/// In-memory queue for walks currently assigned to one block, owned by one
/// execution thread. Overflow is appended to `walks/<block>.walks`.
pub struct WalkBucket {
    buffer: Vec<WalkRecord>,
    capacity: usize,
    walks_path: PathBuf,
    /// Count of records this bucket has spilled to disk and not yet drained.
    spilled: u64,
}

impl WalkBucket {
    pub fn new(walks_dir: &Path, block: crate::types::BlockId, capacity: usize) -> Self {
        WalkBucket {
            buffer: Vec::with_capacity(capacity),
            capacity,
            walks_path: walks_dir.join(format!("{}.walks", block)),
            spilled: 0,
        }
    }

    pub fn in_memory_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn spilled_len(&self) -> u64 {
        self.spilled
    }

    /// Append one record, spilling the whole in-memory buffer to disk first
    /// if it is at capacity.
    pub fn push(&mut self, record: WalkRecord) -> Result<()> {
        if self.buffer.len() >= self.capacity {
            self.spill()?;
        }
        self.buffer.push(record);
        Ok(())
    }

    /// Flush the in-memory buffer to the on-disk queue (append mode) and
    /// reset the in-memory size to zero.
    pub fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(self.buffer.len() * 8);
        for rec in &self.buffer {
            bytes.extend_from_slice(&rec.to_bits().to_ne_bytes());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.walks_path)
            .map_err(|e| GraphWalkerError::QueueWriteError(format!("open {:?}: {}", self.walks_path, e)))?;
        f.write_all(&bytes)
            .map_err(|e| GraphWalkerError::QueueWriteError(format!("append {:?}: {}", self.walks_path, e)))?;
        self.spilled += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Read the disk queue (if any) into the front of `target`, then append
    /// this bucket's in-memory contents, then unlink the disk queue file and
    /// zero both counts. Disk-first, then in-memory, preserves FIFO order.
    pub fn drain_into(&mut self, target: &mut Vec<WalkRecord>) -> Result<()> {
        if self.spilled > 0 {
            let mut f = OpenOptions::new()
                .read(true)
                .open(&self.walks_path)
                .map_err(|e| GraphWalkerError::QueueWriteError(format!("open {:?}: {}", self.walks_path, e)))?;
            let mut bytes = Vec::new();
            f.read_to_end(&mut bytes)
                .map_err(|e| GraphWalkerError::QueueWriteError(format!("read {:?}: {}", self.walks_path, e)))?;
            for chunk in bytes.chunks_exact(8) {
                let bits = u64::from_ne_bytes(chunk.try_into().unwrap());
                target.push(WalkRecord::from_bits(bits));
            }
            std::fs::remove_file(&self.walks_path)
                .map_err(|e| GraphWalkerError::QueueWriteError(format!("remove {:?}: {}", self.walks_path, e)))?;
            self.spilled = 0;
        }
        target.extend(self.buffer.drain(..));
        Ok(())
    }
}
