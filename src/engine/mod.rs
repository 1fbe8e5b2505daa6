//! Execution engine: the load-one-block driver loop and the application
//! adapter contract it exposes to user walk kernels.

pub mod adapter;
pub mod driver;

pub use adapter::{AdvanceContext, ApplicationKernel, BlockLookup};
pub use driver::{Engine, EngineBlockStore};
