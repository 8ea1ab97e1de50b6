//! Configuration models for pools and clusters.

pub mod pool;

pub use pool::{ClusterConfig, PoolConfig, SharedConfig, DEFAULT_MAX};
