//! Walk-centric execution engine for massive random walks over out-of-core
//! graphs (personalized PageRank, multi-source PageRank, and related
//! Monte-Carlo graph analytics).

pub mod block_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod types;
pub mod walk;

pub use block_store::dynamic_store::DynamicBlockStore;
pub use block_store::static_store::{build_from_edges, StaticBlockStore};
pub use block_store::Csr;
pub use config::Config;
pub use engine::{AdvanceContext, ApplicationKernel, BlockLookup, Engine, EngineBlockStore};
pub use error::{GraphWalkerError, Result};
pub use kernel::PersonalizedPageRank;
pub use walk::{BlockSelectionPolicy, MinHopTable, WalkBucket, WalkManager, WalkRecord};
