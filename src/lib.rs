//! # Cancellable staged pipelines for Rust
//!
//! This crate provides a handful of composable concurrency primitives for
//! building multi-stage pipelines over async producers, all driven by a single
//! cancellation signal, plus a timed-stage pipeline built on top of them.
//!
//! ## Core Concepts
//!
//! - **Channel**: an unbuffered handoff stream; a send completes only when a receiver took the value
//! - **Context**: the run's cancellation token and the tracker every worker is spawned on
//! - **Relay**: forwards a stream until it ends or the context is cancelled
//! - **Merge**: fans many streams into one
//! - **Split**: tees one stream into two, paced by the slower consumer
//! - **TimedStage**: simulated work emitting one completion per trigger
//! - **Pipeline**: wires stages, taps them for monitoring, and runs until a watchdog cancels
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use stageweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let report = Pipeline::new()
//!         .stage(StageSpec::new("prep", Pace::fixed(Duration::from_millis(5))))
//!         .stage(StageSpec::new("cook", Pace::fixed(Duration::from_millis(10))).replicas(2))
//!         .run_for(Duration::from_millis(100))
//!         .run(TracingReporter)
//!         .await?;
//!
//!     println!("{:?}", report.elapsed);
//!     Ok(())
//! }
//! ```

pub mod combinators;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod reporters;
pub mod scenario;
pub mod stage;

// Re-export commonly used items
pub mod prelude {
    pub use crate::combinators::{merge, relay, split};
    pub use crate::core::{channel, Context, Delivery, Receiver, Reporter, Sender, Signal};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{
        Pipeline, PipelineConfig, RunReport, RunState, RunningPipeline, Snapshot, StageSpec,
    };
    pub use crate::reporters::{CollectReporter, ConsoleReporter, TracingReporter};
    pub use crate::stage::{Pace, TimedStage};
}

// Re-export main error type
pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
