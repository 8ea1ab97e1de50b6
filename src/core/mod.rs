//! Resource lifecycle, pools, clusters and their shared signal surface.

pub mod cluster;
pub mod error;
pub mod events;
pub mod options;
pub mod pool;
pub mod resource;
pub mod resource_list;
pub mod stats;

pub use cluster::{Cluster, ClusterOptions};
pub use error::{BoxError, ConfigError, Operation, PoolError, SharedError};
pub use events::{EventBus, PoolEvent, PoolId};
pub use options::{AcquireOptions, CloseOptions, PoolOptions, SharedOptions, DEFAULT_ACQUIRE_TIMEOUT};
pub use pool::{Pool, PoolSnapshot, PoolStatus, PoolValue, ResourceSource};
pub use resource::{
    boxed_value_fn, default_is_dead, default_is_idle, BoxFuture, Hooks, PingFn, Predicate, Resource,
    ResourceId, ResourceState,
};
pub use resource_list::{Order, ResourceList};
pub use stats::{ClusterStats, StatsSnapshot};
