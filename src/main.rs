//! stageweld: runs the serial and the parallel prep/cook/pack scenario back to
//! back, printing in-flight counts every minute and the elapsed time of each
//! run.

use stageweld::core::{CancellationToken, Context};
use stageweld::pipeline::Pipeline;
use stageweld::reporters::ConsoleReporter;
use stageweld::{scenario, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    for (name, pipeline) in [("serial", scenario::serial()), ("parallel", scenario::parallel())] {
        if shutdown.is_cancelled() {
            warn!(scenario = name, "skipped after shutdown");
            continue;
        }
        info!(scenario = name, "starting");
        run(pipeline, Context::child_of(&shutdown)).await?;
    }

    Ok(())
}

async fn run(pipeline: Pipeline, ctx: Context) -> Result<()> {
    let mut running = pipeline.start_in(ctx, ConsoleReporter::new())?;
    let report = running.drain().await?;
    println!("{:?}", report.elapsed);
    Ok(())
}

async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!(message = "Signal received.", signal = "SIGINT");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "could not listen for ctrl-c"),
    }
}
