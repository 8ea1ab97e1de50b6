//! Builders to construct pools and clusters.

pub mod pool_builder;

pub use pool_builder::{build_cluster, PoolBuilder};
