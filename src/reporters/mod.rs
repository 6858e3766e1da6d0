//! Reporter implementations for the stage monitor.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

use crate::core::Reporter;
use crate::error::Result;
use crate::pipeline::Snapshot;

/// A reporter that prints each snapshot to stdout.
///
/// Lines look like `prepped: 2, cooked: 1, packed: 7`.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Create a new console reporter
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        println!("{}", snapshot);
        Ok(())
    }
}

/// A reporter that logs each snapshot through `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

#[async_trait]
impl Reporter for TracingReporter {
    async fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        info!(in_flight = %snapshot, "pipeline progress");
        Ok(())
    }

    async fn finish(&mut self, last: &Snapshot) -> Result<()> {
        info!(in_flight = %last, "pipeline monitor stopped");
        Ok(())
    }
}

/// A reporter that collects snapshots in memory.
///
/// Clones share the same storage, so a handle can be kept after the reporter
/// is moved into a pipeline.
#[derive(Debug, Default)]
pub struct CollectReporter {
    snapshots: Arc<TokioMutex<Vec<Snapshot>>>,
    last: Arc<TokioMutex<Option<Snapshot>>>,
}

impl CollectReporter {
    /// Create a new collect reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the snapshots Arc for external access
    pub fn snapshots(&self) -> Arc<TokioMutex<Vec<Snapshot>>> {
        self.snapshots.clone()
    }

    /// The snapshot passed to `finish`, once the monitor has stopped
    pub async fn last(&self) -> Option<Snapshot> {
        self.last.lock().await.clone()
    }
}

impl Clone for CollectReporter {
    fn clone(&self) -> Self {
        Self {
            snapshots: self.snapshots.clone(),
            last: self.last.clone(),
        }
    }
}

#[async_trait]
impl Reporter for CollectReporter {
    async fn report(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.lock().await.push(snapshot.clone());
        Ok(())
    }

    async fn finish(&mut self, last: &Snapshot) -> Result<()> {
        *self.last.lock().await = Some(last.clone());
        Ok(())
    }
}
