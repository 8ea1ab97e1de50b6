//! Error types for pool and cluster operations.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by user-supplied create/destroy/ping callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback error shared between the signal surface and a rejected waiter.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Operation that referenced a value the pool does not track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `release(value)`.
    Release,
    /// `destroy(value)`.
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release => f.write_str("release"),
            Self::Destroy => f.write_str("destroy"),
        }
    }
}

/// Errors produced by pools and clusters.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The pool or cluster is not open.
    #[error("pool is closed")]
    Closed,
    /// No resource became available within the acquire timeout.
    #[error("No resources available.")]
    AcquireTimeout,
    /// The value is not tracked by this pool or cluster.
    #[error("Unable to {0} unknown resource.")]
    UnknownResource(Operation),
    /// No member pool carries the requested attributes.
    #[error("no pool matches attributes {0:?}")]
    NoMatchingPool(Vec<String>),
    /// The cluster has no member pools.
    #[error("cluster has no pools")]
    NoPools,
    /// `ping` was invoked without a ping callback.
    #[error("ping not configured")]
    PingNotConfigured,
    /// The create callback failed.
    #[error("failed to create resource: {0}")]
    Create(#[source] SharedError),
    /// The ping callback failed.
    #[error("ping failed: {0}")]
    Ping(#[source] SharedError),
}

/// Errors raised while validating configuration or constructing a pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No create callback was supplied.
    #[error("pool requires a create callback")]
    MissingCreate,
    /// No destroy callback was supplied.
    #[error("pool requires a destroy callback")]
    MissingDestroy,
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Configuration could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub(crate) fn share(err: BoxError) -> SharedError {
    Arc::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_resource_messages() {
        assert_eq!(
            PoolError::UnknownResource(Operation::Destroy).to_string(),
            "Unable to destroy unknown resource."
        );
        assert_eq!(
            PoolError::UnknownResource(Operation::Release).to_string(),
            "Unable to release unknown resource."
        );
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(PoolError::AcquireTimeout.to_string(), "No resources available.");
    }

    #[test]
    fn test_shared_error_keeps_source() {
        let err = PoolError::Create(share("refused".into()));
        assert_eq!(err.to_string(), "failed to create resource: refused");
        assert!(std::error::Error::source(&err).is_some());
    }
}
