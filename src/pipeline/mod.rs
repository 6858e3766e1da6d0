//! Pipeline orchestration.
//!
//! A [`Pipeline`] wires [`TimedStage`]s together: the first stage runs on its
//! own timer, every stage's output is split into the next stage's trigger and
//! a monitoring tap, and replicated stages are merged back into one stream. A
//! watchdog cancels the whole run after a fixed duration; the caller then
//! drains the last stage's output and gets a [`RunReport`].

pub mod monitor;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::combinators::{merge, split};
use crate::core::{Context, Receiver, Reporter, Signal};
use crate::error::{Error, Result};
use crate::stage::{Pace, TimedStage};

pub use monitor::{InFlight, Snapshot};

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Wall-clock time before the watchdog cancels the run
    pub run_for: Duration,
    /// Interval between monitor reports
    pub tick: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_for: Duration::from_secs(5 * 60 + 10),
            tick: Duration::from_secs(60),
        }
    }
}

/// Description of one stage in a pipeline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageSpec {
    /// Stage name, used in logs and metrics
    pub name: String,
    /// Label used in monitor reports
    pub label: String,
    /// Processing duration policy
    pub pace: Pace,
    /// Number of replicas competing for the stage's triggers
    pub replicas: usize,
}

impl StageSpec {
    /// Create a single-replica stage labelled with its name
    pub fn new<S: Into<String>>(name: S, pace: Pace) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            pace,
            replicas: 1,
        }
    }

    /// Set the monitor label
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Set the replica count
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Check the replica count and pace
    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::no_replicas(&self.name));
        }
        self.pace.validate(&self.name)
    }
}

/// Lifecycle of one run. Each state is entered at most once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunState {
    /// Watchdog armed, stages not yet wired
    Armed,
    /// Stages running
    Running,
    /// Cancellation fired and the final output closed
    Cancelled,
    /// Every worker finished
    Drained,
}

/// Produced count of one stage over a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageCount {
    pub name: String,
    pub produced: u64,
}

/// Final state of a drained run
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    /// Wall-clock time from start until the final output closed
    pub elapsed: Duration,
    /// Completions drained from the final output
    pub completed: u64,
    /// Produced counts as seen by the monitor
    pub stages: Vec<StageCount>,
    /// In-flight approximation at the end of the run
    pub in_flight: Snapshot,
}

/// A staged pipeline, ready to start.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create an empty pipeline with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set how long the run lasts before cancellation
    pub fn run_for(mut self, duration: Duration) -> Self {
        self.config.run_for = duration;
        self
    }

    /// Set the monitor tick interval
    pub fn tick(mut self, interval: Duration) -> Self {
        self.config.tick = interval;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The configured stages
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Validate the pipeline without starting it
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::NoStages);
        }
        self.stages.iter().try_for_each(StageSpec::validate)
    }

    /// Start the run on a fresh context.
    pub fn start<R>(self, reporter: R) -> Result<RunningPipeline>
    where
        R: Reporter + 'static,
    {
        self.start_in(Context::new(), reporter)
    }

    /// Start the run on `ctx`, e.g. a child of a process-wide shutdown token.
    pub fn start_in<R>(self, ctx: Context, reporter: R) -> Result<RunningPipeline>
    where
        R: Reporter + 'static,
    {
        self.validate()?;
        let Pipeline { stages, config } = self;

        ctx.arm_watchdog(config.run_for);
        info!(stages = stages.len(), run_for = ?config.run_for, state = ?RunState::Armed, "pipeline armed");

        let mut trigger: Option<Receiver<Signal>> = None;
        let mut taps = Vec::with_capacity(stages.len());

        for spec in &stages {
            let mut outputs: Vec<Receiver<Signal>> = (0..spec.replicas)
                .map(|_| TimedStage::new(&spec.name, &spec.pace).spawn(&ctx, trigger.clone()))
                .collect();
            let produced = match outputs.len() {
                1 => outputs.remove(0),
                _ => merge(&ctx, outputs),
            };

            let (next, tap) = split(&ctx, produced);
            taps.push(tap);
            trigger = Some(next);
            debug!(stage = %spec.name, replicas = spec.replicas, "stage wired");
        }

        let output = trigger.ok_or(Error::NoStages)?;
        let names = stages.iter().map(|s| s.name.clone()).collect();
        let labels = stages.iter().map(|s| s.label.clone()).collect();
        let monitor = monitor::Monitor::new(names, labels, taps, config.tick, reporter).spawn(&ctx);

        let mut running = RunningPipeline {
            ctx,
            output,
            monitor: Some(monitor),
            stages,
            started: Instant::now(),
            state: RunState::Armed,
            completed: 0,
        };
        running.transition(RunState::Running);
        Ok(running)
    }

    /// Start the run and drain it to completion.
    pub async fn run<R>(self, reporter: R) -> Result<RunReport>
    where
        R: Reporter + 'static,
    {
        let mut running = self.start(reporter)?;
        running.drain().await
    }
}

/// A started run.
pub struct RunningPipeline {
    ctx: Context,
    output: Receiver<Signal>,
    monitor: Option<JoinHandle<Vec<u64>>>,
    stages: Vec<StageSpec>,
    started: Instant,
    state: RunState,
    completed: u64,
}

impl RunningPipeline {
    /// The run's context
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Fire cancellation before the watchdog does
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Take the next completion from the last stage's primary output.
    ///
    /// Returns `None` once the output has closed, which only happens after
    /// cancellation.
    pub async fn next_completion(&mut self) -> Option<Signal> {
        let signal = self.output.recv().await;
        match signal {
            Some(_) => self.completed += 1,
            None if self.state == RunState::Running => {
                // a closed output means nothing upstream can make progress
                self.ctx.cancel();
                self.transition(RunState::Cancelled);
            }
            None => {}
        }
        signal
    }

    /// Drain the final output until it closes, wait for every worker and
    /// report.
    pub async fn drain(&mut self) -> Result<RunReport> {
        if self.state == RunState::Drained {
            return Err(Error::AlreadyDrained);
        }

        while self.next_completion().await.is_some() {}
        let elapsed = self.started.elapsed();

        let counts = match self.monitor.take() {
            Some(monitor) => monitor.await?,
            None => vec![0; self.stages.len()],
        };
        self.ctx.close_and_wait().await;
        self.transition(RunState::Drained);

        let labels: Vec<&str> = self.stages.iter().map(|s| s.label.as_str()).collect();
        let in_flight = Snapshot::from_counts(labels.as_slice(), &counts);
        let stages = self
            .stages
            .iter()
            .zip(&counts)
            .map(|(spec, &produced)| StageCount {
                name: spec.name.clone(),
                produced,
            })
            .collect();

        Ok(RunReport {
            elapsed,
            completed: self.completed,
            stages,
            in_flight,
        })
    }

    fn transition(&mut self, next: RunState) {
        info!(from = ?self.state, to = ?next, "pipeline state changed");
        self.state = next;
    }
}
