//! Timed stages.
//!
//! A stage simulates work: for each trigger it holds for its processing
//! duration and then emits one completion [`Signal`]. The first stage of a
//! pipeline has no upstream and runs on its own timer instead.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::core::{channel, Context, Receiver, Signal};
use crate::error::{Error, Result};

/// How long a stage holds each unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pace {
    /// Always the same duration
    Fixed(Duration),
    /// A duration drawn uniformly from `min..=max`, once per stage instance
    Between { min: Duration, max: Duration },
}

impl Pace {
    /// A fixed pace
    pub fn fixed(duration: Duration) -> Self {
        Pace::Fixed(duration)
    }

    /// A random pace within `min..=max`
    pub fn between(min: Duration, max: Duration) -> Self {
        Pace::Between { min, max }
    }

    /// Check that a random range is not empty.
    pub fn validate(&self, stage: &str) -> Result<()> {
        match *self {
            Pace::Between { min, max } if min > max => Err(Error::InvalidPace {
                stage: stage.to_string(),
                min,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Pick the concrete duration for one stage instance.
    ///
    /// Bounds given in whole seconds draw whole seconds (5s..=8s yields one of
    /// 5, 6, 7 or 8 s); any other range is drawn at millisecond granularity.
    /// An empty range resolves to its lower bound.
    pub fn resolve(&self) -> Duration {
        match *self {
            Pace::Fixed(duration) => duration,
            Pace::Between { min, max } if min >= max => min,
            Pace::Between { min, max } if min.subsec_nanos() == 0 && max.subsec_nanos() == 0 => {
                Duration::from_secs(rand::rng().random_range(min.as_secs()..=max.as_secs()))
            }
            Pace::Between { min, max } => {
                let lo = min.as_millis() as u64;
                let hi = max.as_millis() as u64;
                Duration::from_millis(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

/// One instance of a timed stage.
#[derive(Debug, Clone)]
pub struct TimedStage {
    name: String,
    duration: Duration,
}

impl TimedStage {
    /// Create a stage instance, resolving `pace` to a single duration.
    pub fn new<S: Into<String>>(name: S, pace: &Pace) -> Self {
        Self {
            name: name.into(),
            duration: pace.resolve(),
        }
    }

    /// The stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The processing duration this instance holds each unit of work for
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start the stage worker and return its completion stream.
    ///
    /// With a `trigger` stream the worker takes one trigger per unit of work
    /// and stops when the triggers run out. Without one it is self-timed and
    /// runs until cancellation. Cancellation during the hold abandons the
    /// unit: no completion is emitted for it.
    ///
    /// Replicas are separate instances spawned with clones of the same
    /// trigger receiver; they compete for triggers.
    pub fn spawn(self, ctx: &Context, trigger: Option<Receiver<Signal>>) -> Receiver<Signal> {
        let (tx, rx) = channel();
        let token = ctx.token().clone();

        ctx.spawn(async move {
            let TimedStage { name, duration } = self;
            let self_timed = trigger.is_none();
            let mut completed = 0u64;
            debug!(stage = %name, ?duration, self_timed, "stage started");

            loop {
                if let Some(trigger) = &trigger {
                    if trigger.recv_until(&token).await.is_none() {
                        break;
                    }
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = sleep(duration) => {}
                }

                if !tx.deliver(&token, Signal).await.is_delivered() {
                    break;
                }
                completed += 1;
            }

            debug!(stage = %name, completed, "stage stopped");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_fixed_pace_resolves_to_itself() {
        let pace = Pace::fixed(Duration::from_secs(10));
        assert_eq!(pace.resolve(), Duration::from_secs(10));
    }

    #[test]
    fn test_random_pace_stays_in_range() {
        let pace = Pace::between(Duration::from_secs(5), Duration::from_secs(8));
        for _ in 0..100 {
            let d = pace.resolve();
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(8));
            assert_eq!(d.subsec_nanos(), 0);
        }
    }

    #[test]
    fn test_fractional_pace_draws_milliseconds() {
        let pace = Pace::between(Duration::from_millis(1500), Duration::from_millis(1510));
        for _ in 0..100 {
            let d = pace.resolve();
            assert!(d >= Duration::from_millis(1500) && d <= Duration::from_millis(1510));
            assert_eq!(d.subsec_nanos() % 1_000_000, 0);
        }
    }

    #[test]
    fn test_random_pace_drawn_once_per_instance() {
        let pace = Pace::between(Duration::from_secs(5), Duration::from_secs(8));
        let stage = TimedStage::new("prep", &pace);
        let first = stage.duration();
        assert_eq!(stage.duration(), first);
        assert_eq!(stage.clone().duration(), first);
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let pace = Pace::between(Duration::from_secs(8), Duration::from_secs(5));
        assert!(matches!(
            pace.validate("prep"),
            Err(Error::InvalidPace { stage, .. }) if stage == "prep"
        ));
        assert_eq!(pace.resolve(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_emits_once_per_trigger_after_duration() {
        let ctx = Context::new();
        let hold = Duration::from_millis(100);
        let (trigger_tx, trigger_rx) = channel();
        let out = TimedStage::new("cook", &Pace::fixed(hold)).spawn(&ctx, Some(trigger_rx));

        let triggers = tokio::spawn(async move {
            let mut consumed = Vec::new();
            for _ in 0..5 {
                sleep(Duration::from_millis(150)).await;
                trigger_tx.send(Signal).await.unwrap();
                consumed.push(Instant::now());
            }
            consumed
        });

        let mut completed = Vec::new();
        while let Some(Signal) = out.recv().await {
            completed.push(Instant::now());
        }
        let consumed = triggers.await.unwrap();

        assert_eq!(completed.len(), 5);
        for (done, taken) in completed.iter().zip(&consumed) {
            assert!(*done - *taken >= hold);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_timed_stage_paces_itself() {
        let ctx = Context::new();
        let started = Instant::now();
        let out = TimedStage::new("prep", &Pace::fixed(Duration::from_secs(2))).spawn(&ctx, None);

        for n in 1..=3u32 {
            assert_eq!(out.recv().await, Some(Signal));
            assert!(started.elapsed() >= Duration::from_secs(2) * n);
        }
        ctx.cancel();
        assert_eq!(out.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_hold_abandons_work() {
        let ctx = Context::new();
        let (trigger_tx, trigger_rx) = channel();
        let out = TimedStage::new("pack", &Pace::fixed(Duration::from_secs(2)))
            .spawn(&ctx, Some(trigger_rx));

        trigger_tx.send(Signal).await.unwrap();
        sleep(Duration::from_secs(1)).await;
        ctx.cancel();

        assert_eq!(out.recv().await, None);
        ctx.close_and_wait().await;
        assert_eq!(ctx.active_workers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replicas_share_triggers() {
        let ctx = Context::new();
        let hold = Duration::from_secs(1);
        let (trigger_tx, trigger_rx) = channel();
        let outputs: Vec<_> = (0..3)
            .map(|_| {
                TimedStage::new("cook", &Pace::fixed(hold)).spawn(&ctx, Some(trigger_rx.clone()))
            })
            .collect();
        drop(trigger_rx);
        let out = crate::combinators::merge(&ctx, outputs);

        let started = Instant::now();
        tokio::spawn(async move {
            for _ in 0..3 {
                trigger_tx.send(Signal).await.unwrap();
            }
        });

        let mut count = 0;
        while out.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        // three replicas work the three triggers side by side
        assert!(started.elapsed() < hold * 2);
    }
}
