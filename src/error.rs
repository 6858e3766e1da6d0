//! Error types for the pipeline primitives.
//!
//! Cancellation is not an error: every combinator treats it as a normal
//! shutdown and simply closes its outputs. The variants here cover what the
//! type system surfaces anyway: bad configuration, closed channels and
//! worker joins.

use std::time::Duration;
use thiserror::Error;

/// The main error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A pipeline was started without any stages
    #[error("pipeline has no stages")]
    NoStages,

    /// A stage was configured with zero replicas
    #[error("stage `{stage}` needs at least one replica")]
    NoReplicas { stage: String },

    /// A random pace whose lower bound exceeds its upper bound
    #[error("stage `{stage}` has an empty pace range: {min:?} > {max:?}")]
    InvalidPace {
        stage: String,
        min: Duration,
        max: Duration,
    },

    /// Every receiver of a channel was dropped
    #[error("channel was closed")]
    ChannelClosed,

    /// A run was drained a second time
    #[error("pipeline run was already drained")]
    AlreadyDrained,

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create a zero-replica error for the named stage
    pub fn no_replicas<S: Into<String>>(stage: S) -> Self {
        Error::NoReplicas {
            stage: stage.into(),
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;
