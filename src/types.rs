//! Shared id types and packed-record width constants.
//!
//! Named after the original engine's typedefs (`vid_t`, `eid_t`, `bid_t`, ...)
//! so the rest of the crate reads the way the rest of the glossary does.

/// Vertex id, absolute within the whole graph.
pub type VertexId = u32;
/// Edge count / offset within a block's CSR.
pub type EdgeId = u64;
/// Block id.
pub type BlockId = u32;
/// Log-group id.
pub type GroupId = u32;
/// Hop counter, bounded by the 14-bit field in a packed walk record.
pub type HopCount = u16;
/// Thread id assigned by the execution driver's thread pool.
pub type ThreadId = usize;
/// Count of live walks.
pub type WalkCount = u64;
/// Index into the application's source set, bounded by the 24-bit field in a
/// packed walk record.
pub type SourceId = u32;

/// Maximum hop value representable in the 14-bit hop field.
pub const MAX_HOP: HopCount = (1 << 14) - 1;
/// Maximum source id representable in the 24-bit source field.
pub const MAX_SOURCE: SourceId = (1 << 24) - 1;
/// Maximum local vertex offset representable in the 26-bit current field.
pub const MAX_LOCAL_OFFSET: VertexId = (1 << 26) - 1;
