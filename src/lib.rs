//! # Prometheus Resource Pool
//!
//! Async pooling of expensive, reusable resources (database connections,
//! sockets, worker handles) with background maintenance and attribute-routed
//! clusters.
//!
//! A [`Pool`](core::Pool) hands out values produced by user callbacks, keeps
//! `min <= size <= max`, queues acquires by priority when nothing is
//! available, and periodically pings idle resources and skims dead or excess
//! idle ones. A [`Cluster`](core::Cluster) groups pools tagged with attributes
//! and routes each acquire to a pool carrying every requested tag.
//!
//! ## Key Features
//!
//! - **Bounded capacity**: creation starts only when a waiter would otherwise go unserved
//! - **Priority acquire queue**: higher priority first, FIFO among equals, per-call timeout
//! - **Maintenance timers**: ping idle resources, destroy dead and surplus idle ones
//! - **Clusters**: attribute routing, shared options, a single callback concurrency ceiling
//! - **Signals**: `Available`, `Created`, `Destroyed` and error events on a broadcast channel
//!
//! ```rust,ignore
//! use prometheus_resource_pool::builders::PoolBuilder;
//! use prometheus_resource_pool::core::{AcquireOptions, CloseOptions};
//! use std::time::Duration;
//!
//! let pool = PoolBuilder::new()
//!     .create(|| async { Connection::open("db://primary").await })
//!     .destroy(|conn: Connection| async move { conn.shutdown().await })
//!     .min(2)
//!     .max(8)
//!     .acquire_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! pool.open().await?;
//! let conn = pool.acquire(AcquireOptions::new().with_priority(1)).await?;
//! // ... use conn ...
//! pool.release(&conn)?;
//! pool.close(CloseOptions::default()).await?;
//! ```
//!
//! For complete scenarios, see `tests/pool_test.rs` and `tests/cluster_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Resources, pools, clusters and their signals.
pub mod core;
/// Serde configuration models for pools and clusters.
pub mod config;
/// Builders to construct pools and clusters from code or configuration.
pub mod builders;
/// Waiter and request queues shared by pools.
pub mod infra;
/// Shared utilities.
pub mod util;
