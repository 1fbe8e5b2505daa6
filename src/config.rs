//! Engine configuration: the recognised CLI/programmatic options, gathered
//! into one struct instead of threaded through as loose function arguments —
//! the way `delta::types::DiffOptions` gathers `p`/`q`/`max_table`/... for
//! the diff algorithms.

use crate::error::{GraphWalkerError, Result};
use crate::walk::manager::BlockSelectionPolicy;

/// Default `WALK_BUFFER_SIZE`: in-memory capacity per `(thread, block)`
/// bucket before a spill, matching the original engine's `#define`.
pub const DEFAULT_WALK_BUFFER_SIZE: usize = 4096;
/// Default per-group in-memory log capacity (entries) before a forced append.
pub const DEFAULT_LOGCAP: usize = 16 * 1024;
/// Default global edge-buffer capacity (dynamic graph only), in edges.
pub const DEFAULT_BUFCAP: usize = 4 * 1024 * 1024;
/// Default target maximum bytes per CSR block.
pub const DEFAULT_BLOCKSIZE: usize = 64 * 1024 * 1024;
/// Default disk log-file size (bytes) that triggers compaction of its block.
pub const DEFAULT_LOGSIZE: usize = 16 * 1024 * 1024;
/// Default vertices per log group; must be a power of two.
pub const DEFAULT_NVERTS_PER_GROUP: u32 = 1 << 16;

/// Engine-wide configuration, built from CLI flags or programmatically.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base path / basename for the on-disk store, mirrors `file`.
    pub base_path: std::path::PathBuf,
    /// Target maximum bytes per CSR block (`shardsize`/`blocksize`).
    pub blocksize: usize,
    /// `T`, number of parallel execution threads (`execthreads`).
    pub exec_threads: usize,
    /// Block-selection policy, including the `prob` mixing weight.
    pub policy: BlockSelectionPolicy,
    /// First seed vertex id (`firstsource`).
    pub first_source: u32,
    /// Number of seed vertices (`numsources`).
    pub num_sources: u32,
    /// Walks started per source (`walkspersource`/`R`).
    pub walks_per_source: u32,
    /// Per-walk hop bound (`maxwalklength`/`L`).
    pub max_walk_length: u16,
    /// In-memory capacity per `(thread, block)` bucket before spill.
    pub walk_buffer_size: usize,
    /// Per-group in-memory log capacity (entries) before a forced append.
    pub logcap: usize,
    /// Disk log-file size (bytes) that triggers compaction.
    pub logsize: usize,
    /// Global edge-buffer capacity (dynamic graph only), in edges.
    pub bufcap: usize,
    /// Vertices per log group; must be a power of two.
    pub nverts_per_group: u32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.nverts_per_group.is_power_of_two() {
            return Err(GraphWalkerError::ConfigInvalid(format!(
                "nverts_per_grp {} is not a power of two",
                self.nverts_per_group
            )));
        }
        if self.exec_threads == 0 {
            return Err(GraphWalkerError::ConfigInvalid(
                "execthreads must be >= 1".into(),
            ));
        }
        if self.walk_buffer_size == 0 {
            return Err(GraphWalkerError::ConfigInvalid(
                "walk-buffer-size must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of trailing zero bits in `nverts_per_group`, i.e. `k` in
    /// `G = 2^k`, so that a group lookup is a plain `v >> k`.
    pub fn group_shift(&self) -> u32 {
        self.nverts_per_group.trailing_zeros()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_path: std::path::PathBuf::from("graphwalker_data"),
            blocksize: DEFAULT_BLOCKSIZE,
            exec_threads: 1,
            policy: BlockSelectionPolicy::default(),
            first_source: 0,
            num_sources: 1,
            walks_per_source: 1,
            max_walk_length: 20,
            walk_buffer_size: DEFAULT_WALK_BUFFER_SIZE,
            logcap: DEFAULT_LOGCAP,
            logsize: DEFAULT_LOGSIZE,
            bufcap: DEFAULT_BUFCAP,
            nverts_per_group: DEFAULT_NVERTS_PER_GROUP,
        }
    }
}

/// Parse a size with an optional k/M/G suffix (decimal: k=1000, M=1_000_000,
/// G=1_000_000_000). Mirrors `delta::main`'s `parse_size_suffix`.
pub fn parse_size_suffix(s: &str) -> std::result::Result<usize, String> {
    let s = s.trim();
    let (num_str, mult) = match s.as_bytes().last() {
        Some(b'k') | Some(b'K') => (&s[..s.len() - 1], 1_000usize),
        Some(b'M') | Some(b'm') => (&s[..s.len() - 1], 1_000_000usize),
        Some(b'G') | Some(b'g') => (&s[..s.len() - 1], 1_000_000_000usize),
        _ => (s, 1usize),
    };
    let n: usize = num_str
        .parse()
        .map_err(|_| format!("invalid number: '{}'", num_str))?;
    n.checked_mul(mult)
        .ok_or_else(|| format!("'{}' overflows usize", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_group_size() {
        let mut cfg = Config::default();
        cfg.nverts_per_group = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn group_shift_matches_log2() {
        let mut cfg = Config::default();
        cfg.nverts_per_group = 1024;
        assert_eq!(cfg.group_shift(), 10);
    }

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!(parse_size_suffix("64M").unwrap(), 64_000_000);
        assert_eq!(parse_size_suffix("2k").unwrap(), 2_000);
        assert_eq!(parse_size_suffix("128").unwrap(), 128);
    }
}
