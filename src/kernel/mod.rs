//! Demo application kernels exercising the engine end to end. The
//! application-level walk kernel itself is the user's to supply; this
//! module is just a real, runnable instance of one.

pub mod ppr;

pub use ppr::PersonalizedPageRank;
