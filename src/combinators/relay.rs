//! Cancellable relay.

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::core::{channel, Context, Receiver, Sender};

/// Forward every value of `source` onto a new stream.
///
/// The new stream closes when the source closes or the context is
/// cancelled. A value already taken from the source but not yet accepted
/// downstream when cancellation fires is dropped.
pub fn relay<T>(ctx: &Context, source: Receiver<T>) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = channel();
    ctx.spawn(forward(ctx.token().clone(), source, tx));
    rx
}

/// Relay loop shared by [`relay`] and the merge lanes.
///
/// Returns how many values were delivered. `out` is dropped on return,
/// closing its stream if it was the last sender.
pub(crate) async fn forward<T>(
    token: CancellationToken,
    source: Receiver<T>,
    out: Sender<T>,
) -> usize {
    let mut relayed = 0;
    while let Some(value) = source.recv_until(&token).await {
        if !out.deliver(&token, value).await.is_delivered() {
            break;
        }
        relayed += 1;
    }
    trace!(relayed, cancelled = token.is_cancelled(), "relay finished");
    relayed
}
