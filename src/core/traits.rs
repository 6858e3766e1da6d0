//! Core types shared by the stages and the monitor.
//!
//! A [`Signal`] is the token carried between stages; a [`Reporter`] receives
//! the monitor's periodic snapshots.

use crate::error::Result;
use crate::pipeline::monitor::Snapshot;
use async_trait::async_trait;

/// A content-free token marking one unit of work done or available.
///
/// Only the occurrence of a signal matters, never its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signal;

/// A reporter receives the monitor's in-flight snapshots.
///
/// Reports are diagnostic. A failing reporter is logged and the run carries
/// on.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use stageweld::core::Reporter;
/// use stageweld::error::Result;
/// use stageweld::pipeline::Snapshot;
///
/// struct LogReporter;
///
/// #[async_trait]
/// impl Reporter for LogReporter {
///     async fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
///         println!("in flight: {}", snapshot);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Reporter: Send {
    /// Handle one periodic snapshot.
    async fn report(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Called once when the monitor stops, with the last counts it saw.
    async fn finish(&mut self, _last: &Snapshot) -> Result<()> {
        Ok(())
    }
}
