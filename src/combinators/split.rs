//! Tee: duplicate one stream onto two.

use tracing::debug;

use crate::core::{channel, Context, Receiver, Sender};

/// Duplicate every value of `source` onto two output streams.
///
/// Each value is offered to both outputs at once, and the next value is only
/// read after both took it, so the slower consumer paces the source. If
/// cancellation fires while an output is still pending, the value is
/// abandoned for that output. Both outputs close together when the source
/// closes or the context is cancelled.
///
/// An output whose receivers were all dropped is skipped from then on; the
/// splitter stops once both are gone.
pub fn split<T>(ctx: &Context, source: Receiver<T>) -> (Receiver<T>, Receiver<T>)
where
    T: Clone + Send + 'static,
{
    let (left_tx, left) = channel();
    let (right_tx, right) = channel();
    let token = ctx.token().clone();

    ctx.spawn(async move {
        let mut outputs = [Some(left_tx), Some(right_tx)];
        let mut duplicated = 0usize;

        while let Some(value) = source.recv_until(&token).await {
            let (left_ok, right_ok) = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                accepted = offer_both(&outputs, value) => accepted,
            };

            for (slot, ok) in outputs.iter_mut().zip([left_ok, right_ok]) {
                if !ok {
                    *slot = None;
                }
            }
            if outputs.iter().all(Option::is_none) {
                break;
            }
            duplicated += 1;
        }

        debug!(duplicated, cancelled = token.is_cancelled(), "splitter finished");
        // both outputs drop here, closing together
    });

    (left, right)
}

async fn offer_both<T: Clone>(outputs: &[Option<Sender<T>>; 2], value: T) -> (bool, bool) {
    let [left, right] = outputs;
    tokio::join!(offer(left, value.clone()), offer(right, value))
}

async fn offer<T>(output: &Option<Sender<T>>, value: T) -> bool {
    match output {
        Some(tx) => tx.send(value).await.is_ok(),
        None => false,
    }
}
