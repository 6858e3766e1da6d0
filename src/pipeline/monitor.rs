//! Stage monitor: counts tap signals and reports approximate in-flight work.
//!
//! The in-flight figure for a stage is its produced count minus the next
//! stage's produced count (the last stage reports its own count). Counters are
//! sampled without any coordination with the stages, so a snapshot can be
//! transiently inconsistent or even negative. It is a diagnostic, nothing
//! more.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::{Stream, StreamExt, StreamMap};
use tracing::{debug, warn};

use crate::core::{Context, Receiver, Reporter, Signal};

/// Approximate in-flight count for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InFlight {
    pub label: String,
    pub count: i64,
}

/// One periodic reading of every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub stages: Vec<InFlight>,
}

impl Snapshot {
    /// Build a snapshot from per-stage produced counts.
    pub fn from_counts<S: AsRef<str>>(labels: &[S], counts: &[u64]) -> Self {
        let stages = labels
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(i, (label, &produced))| {
                let downstream = counts.get(i + 1).copied().unwrap_or(0);
                InFlight {
                    label: label.as_ref().to_string(),
                    count: produced as i64 - downstream as i64,
                }
            })
            .collect();
        Self { stages }
    }

    /// In-flight count for the stage with `label`
    pub fn get(&self, label: &str) -> Option<i64> {
        self.stages
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.count)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", stage.label, stage.count)?;
        }
        Ok(())
    }
}

type Tap = Pin<Box<dyn Stream<Item = Signal> + Send>>;

/// Worker that owns the per-stage counters.
///
/// Only the monitor task writes the counters, so they need no lock.
pub(crate) struct Monitor<R> {
    names: Vec<String>,
    labels: Vec<String>,
    taps: Vec<Receiver<Signal>>,
    tick: Duration,
    reporter: R,
}

impl<R: Reporter + 'static> Monitor<R> {
    pub(crate) fn new(
        names: Vec<String>,
        labels: Vec<String>,
        taps: Vec<Receiver<Signal>>,
        tick: Duration,
        reporter: R,
    ) -> Self {
        Self {
            names,
            labels,
            taps,
            tick,
            reporter,
        }
    }

    /// Spawn the monitor. The handle yields the final produced counts.
    pub(crate) fn spawn(self, ctx: &Context) -> JoinHandle<Vec<u64>> {
        let token = ctx.token().clone();
        ctx.spawn(async move { self.run(token).await })
    }

    async fn run(self, token: tokio_util::sync::CancellationToken) -> Vec<u64> {
        let Monitor {
            names,
            labels,
            taps,
            tick,
            mut reporter,
        } = self;

        let mut counts = vec![0u64; taps.len()];
        let mut streams: StreamMap<usize, Tap> = StreamMap::new();
        for (stage, tap) in taps.into_iter().enumerate() {
            streams.insert(stage, Box::pin(tap.into_stream()));
        }

        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = Snapshot::from_counts(labels.as_slice(), &counts);
                    record_in_flight(&snapshot);
                    if let Err(e) = reporter.report(&snapshot).await {
                        warn!(error = %e, "reporter failed");
                    }
                }
                Some((stage, Signal)) = streams.next() => {
                    counts[stage] += 1;
                    record_completion(&names[stage]);
                }
            }
        }

        let last = Snapshot::from_counts(labels.as_slice(), &counts);
        if let Err(e) = reporter.finish(&last).await {
            warn!(error = %e, "reporter failed to finish");
        }
        debug!(?counts, "monitor stopped");
        counts
    }
}

#[cfg(feature = "metrics")]
fn record_completion(stage: &str) {
    metrics::counter!("stageweld_stage_completions_total", "stage" => stage.to_string())
        .increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_completion(_stage: &str) {}

#[cfg(feature = "metrics")]
fn record_in_flight(snapshot: &Snapshot) {
    for stage in &snapshot.stages {
        metrics::gauge!("stageweld_stage_in_flight", "stage" => stage.label.clone())
            .set(stage.count as f64);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_in_flight(_snapshot: &Snapshot) {}
