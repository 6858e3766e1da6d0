//! Unbuffered handoff channel.
//!
//! Every stream between workers is a rendezvous: a send completes only once a
//! receiver has taken the value. Each value travels with a one-shot
//! acknowledgement; a receiver that finds the acknowledgement already
//! abandoned discards the value, so a sender that gave up (because it was
//! cancelled) never has its value surface later.
//!
//! The stream closes when the last [`Sender`] is dropped. Closing is tied to
//! ownership, which makes a double close unrepresentable.

use futures_core::Stream;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

struct Handoff<T> {
    value: T,
    ack: oneshot::Sender<()>,
}

/// Create a new unbuffered channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (
        Sender { inner: tx },
        Receiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Outcome of a cancellable delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A receiver took the value
    Delivered,
    /// Cancellation fired first; the value was dropped
    Cancelled,
    /// Every receiver is gone
    Closed,
}

impl Delivery {
    pub fn is_delivered(self) -> bool {
        self == Delivery::Delivered
    }
}

/// Sending half of a handoff channel.
///
/// Clones feed the same stream; it closes once all of them are dropped.
pub struct Sender<T> {
    inner: mpsc::Sender<Handoff<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Sender<T> {
    /// Hand `value` to a receiver, waiting until one takes it.
    ///
    /// Dropping the returned future before it completes abandons the value.
    pub async fn send(&self, value: T) -> Result<()> {
        let (ack, acked) = oneshot::channel();
        self.inner
            .send(Handoff { value, ack })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        acked.await.map_err(|_| Error::ChannelClosed)
    }

    /// Like [`send`](Self::send), but gives up as soon as `token` fires.
    ///
    /// A value a receiver already took counts as delivered even if the token
    /// fired before this future noticed.
    pub async fn deliver(&self, token: &CancellationToken, value: T) -> Delivery {
        let (ack, mut acked) = oneshot::channel();
        let queued = tokio::select! {
            biased;
            _ = token.cancelled() => return Delivery::Cancelled,
            queued = self.inner.send(Handoff { value, ack }) => queued,
        };
        if queued.is_err() {
            return Delivery::Closed;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => match acked.try_recv() {
                Ok(()) => Delivery::Delivered,
                // dropping `acked` here makes the receiver discard the value
                Err(_) => Delivery::Cancelled,
            },
            taken = &mut acked => match taken {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
        }
    }
}

/// Receiving half of a handoff channel.
///
/// Clones share the stream and compete for values: each value is taken by
/// exactly one of them.
pub struct Receiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<Handoff<T>>>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Receiver<T> {
    /// Take the next value, or `None` once every sender is gone.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.inner.lock().await;
        while let Some(Handoff { value, ack }) = rx.recv().await {
            if ack.send(()).is_ok() {
                return Some(value);
            }
            // the sender stopped waiting for this one
        }
        None
    }

    /// Like [`recv`](Self::recv), but yields `None` as soon as `token` fires.
    pub async fn recv_until(&self, token: &CancellationToken) -> Option<T> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            value = self.recv() => value,
        }
    }

    /// Adapt this receiver into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = T> + Send
    where
        T: Send,
    {
        futures::stream::unfold(self, |rx| async move {
            let value = rx.recv().await?;
            Some((value, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, assert_ready_ok};

    #[test]
    fn test_send_waits_for_receiver() {
        let (tx, rx) = channel::<u32>();

        let mut send = task::spawn(tx.send(7));
        assert_pending!(send.poll());

        let mut recv = task::spawn(rx.recv());
        assert_ready_eq!(recv.poll(), Some(7));

        assert!(send.is_woken());
        assert_ready_ok!(send.poll());
    }

    #[test]
    fn test_abandoned_send_is_discarded() {
        let (tx, rx) = channel::<u32>();

        let mut send = task::spawn(tx.send(1));
        assert_pending!(send.poll());
        drop(send);
        drop(tx);

        let mut recv = task::spawn(rx.recv());
        assert_ready_eq!(recv.poll(), None);
    }

    #[test]
    fn test_send_fails_without_receivers() {
        let (tx, rx) = channel::<u32>();
        drop(rx);

        let mut send = task::spawn(tx.send(1));
        let result = assert_ready!(send.poll());
        assert!(matches!(result, Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_closed_stream_keeps_returning_none() {
        let (tx, rx) = channel::<u32>();
        drop(tx);

        for _ in 0..3 {
            let mut recv = task::spawn(rx.recv());
            assert_ready_eq!(recv.poll(), None);
        }
    }

    #[tokio::test]
    async fn test_deliver_prefers_cancellation() {
        let (tx, _rx) = channel::<u32>();
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(tx.deliver(&token, 1).await, Delivery::Cancelled);
    }

    #[test]
    fn test_deliver_counts_taken_value_despite_late_cancel() {
        let (tx, rx) = channel::<u32>();
        let token = CancellationToken::new();

        let mut send = task::spawn(tx.deliver(&token, 5));
        assert_pending!(send.poll());

        let mut recv = task::spawn(rx.recv());
        assert_ready_eq!(recv.poll(), Some(5));

        token.cancel();
        assert_ready_eq!(send.poll(), Delivery::Delivered);
    }

    #[test]
    fn test_deliver_cancelled_while_waiting_drops_value() {
        let (tx, rx) = channel::<u32>();
        let token = CancellationToken::new();

        let mut send = task::spawn(tx.deliver(&token, 5));
        assert_pending!(send.poll());

        token.cancel();
        assert_ready_eq!(send.poll(), Delivery::Cancelled);
        drop(send);
        drop(tx);

        let mut recv = task::spawn(rx.recv());
        assert_ready_eq!(recv.poll(), None);
    }

    #[tokio::test]
    async fn test_deliver_reports_closed() {
        let (tx, rx) = channel::<u32>();
        drop(rx);

        let token = CancellationToken::new();
        assert_eq!(tx.deliver(&token, 1).await, Delivery::Closed);
    }

    #[tokio::test]
    async fn test_recv_until_returns_on_cancel() {
        let (_tx, rx) = channel::<u32>();
        let token = CancellationToken::new();

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { rx.recv_until(&token).await })
        };
        token.cancel();

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cloned_receivers_compete() {
        let (tx, rx) = channel::<u32>();
        let other = rx.clone();

        let producer = tokio::spawn(async move {
            for i in 0..10 {
                tx.send(i).await.unwrap();
            }
        });

        let first = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(v) = rx.recv().await {
                seen.push(v);
            }
            seen
        });
        let second = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(v) = other.recv().await {
                seen.push(v);
            }
            seen
        });

        producer.await.unwrap();
        let mut all = first.await.unwrap();
        all.extend(second.await.unwrap());
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_into_stream() {
        use futures::StreamExt;

        let (tx, rx) = channel::<u32>();
        tokio::spawn(async move {
            for i in 1..=3 {
                tx.send(i).await.unwrap();
            }
        });

        let items: Vec<u32> = rx.into_stream().collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }
}
