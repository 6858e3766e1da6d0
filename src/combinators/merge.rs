//! Fan-in of many streams into one.

use tokio::task::JoinSet;
use tracing::debug;

use super::relay::{forward, relay};
use crate::core::{channel, Context, Receiver};

/// Merge `sources` into a single stream.
///
/// Each source is relayed and drained by its own lane, so a slow source
/// never holds back a fast one. Values keep their order within a source; across
/// sources whichever is ready first goes first. The merged stream closes
/// once every lane has finished, that is when all sources have closed or
/// the context was cancelled.
pub fn merge<T, I>(ctx: &Context, sources: I) -> Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Receiver<T>>,
{
    let (tx, rx) = channel();
    let mut lanes = JoinSet::new();

    for source in sources {
        let relayed = relay(ctx, source);
        let lane = forward(ctx.token().clone(), relayed, tx.clone());
        lanes.spawn(ctx.track(lane));
    }

    ctx.spawn(async move {
        let mut merged = 0;
        let width = lanes.len();
        while let Some(joined) = lanes.join_next().await {
            match joined {
                Ok(relayed) => merged += relayed,
                Err(e) => debug!(error = %e, "merge lane did not finish cleanly"),
            }
        }
        debug!(width, merged, "all merge lanes finished");
        // every lane is done; closing the merged stream
        drop(tx);
    });

    rx
}
