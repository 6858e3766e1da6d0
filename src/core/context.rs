//! Run context: the cancellation token and the tracker every worker runs on.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TrackedFuture;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Shared state of one pipeline run.
///
/// Passed by reference to every component constructor. Cloning is cheap and
/// yields a handle to the same token and tracker.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Context {
    /// Create a context with a fresh, unfired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that is also cancelled when `parent` fires.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tracker: TaskTracker::new(),
        }
    }

    /// The run's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fire cancellation. Later calls have no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking check of the token.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the token fires.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Spawn a tracked worker.
    pub fn spawn<F>(&self, worker: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(worker)
    }

    /// Wrap a future so it counts as a live worker until it completes.
    ///
    /// Used when the future is driven by something other than
    /// [`spawn`](Self::spawn), e.g. a `JoinSet`.
    pub fn track<F: Future>(&self, worker: F) -> TrackedFuture<F> {
        self.tracker.track_future(worker)
    }

    /// Number of tracked workers that have not finished yet.
    pub fn active_workers(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait until every tracked worker has finished.
    ///
    /// Closing does not prevent later spawns; it only lets the wait complete
    /// once the count reaches zero.
    pub async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Spawn the watchdog that fires cancellation after `after`.
    ///
    /// The watchdog exits early if the token is fired by someone else.
    pub fn arm_watchdog(&self, after: Duration) -> JoinHandle<()> {
        let token = self.token.clone();
        debug!(?after, "watchdog armed");
        self.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("watchdog stood down, run already cancelled");
                }
                _ = tokio::time::sleep(after) => {
                    info!(?after, "run time elapsed, cancelling");
                    token.cancel();
                }
            }
        })
    }
}
