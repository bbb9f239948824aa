//! Backfill-then-live gating.
//!
//! Each subscription moves through `Created -> AwaitingHistory -> GraceArmed -> Live`. The grace
//! timer is armed once every announced historical record has been delivered or reported as
//! filtered, and is cancelled (`GraceArmed -> AwaitingHistory`) by any further history. `Live` is
//! terminal.

use std::{future::poll_fn, time::Duration};

use tokio_util::time::{DelayQueue, delay_queue::Key};

use crate::SubscriptionId;

/// Default delay between the last historical record and the switch to live delivery.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LiveGate {
    Created,
    AwaitingHistory,
    GraceArmed(Key),
    Live,
}

/// Public view of a subscription's gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No record has been dequeued yet.
    Created,
    /// Historical records are still expected; live records are held back.
    AwaitingHistory,
    /// The backfill looks complete and the grace timer is running.
    GraceArmed,
    /// Live records pass straight through.
    Live,
}

impl LiveGate {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveGate::Live)
    }

    pub fn state(&self) -> GateState {
        match self {
            LiveGate::Created => GateState::Created,
            LiveGate::AwaitingHistory => GateState::AwaitingHistory,
            LiveGate::GraceArmed(_) => GateState::GraceArmed,
            LiveGate::Live => GateState::Live,
        }
    }
}

/// Pending grace timers, keyed by the subscription they will switch to live.
#[derive(Debug)]
pub(crate) struct GraceTimers {
    queue: DelayQueue<SubscriptionId>,
    period: Duration,
}

impl GraceTimers {
    pub fn new(period: Duration) -> Self {
        Self { queue: DelayQueue::new(), period }
    }

    pub fn arm(&mut self, id: SubscriptionId) -> Key {
        self.queue.insert(id, self.period)
    }

    pub fn cancel(&mut self, key: &Key) {
        self.queue.try_remove(key);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waits for the next timer to fire and returns its subscription together with the key it
    /// was armed under.
    pub async fn next_expired(&mut self) -> Option<(SubscriptionId, Key)> {
        poll_fn(|cx| self.queue.poll_expired(cx))
            .await
            .map(|expired| {
                let key = expired.key();
                (expired.into_inner(), key)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_grace_period() {
        let mut timers = GraceTimers::new(DEFAULT_GRACE_PERIOD);
        let start = tokio::time::Instant::now();
        let key = timers.arm(SubscriptionId::new("a"));

        let (id, fired) = timers.next_expired().await.unwrap();

        assert_eq!(id.as_str(), "a");
        assert_eq!(fired, key);
        assert!(start.elapsed() >= DEFAULT_GRACE_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut timers = GraceTimers::new(Duration::from_millis(10));
        let cancelled = timers.arm(SubscriptionId::new("a"));
        timers.arm(SubscriptionId::new("b"));
        timers.cancel(&cancelled);
        // cancelling twice is harmless
        timers.cancel(&cancelled);

        let (id, _) = timers.next_expired().await.unwrap();
        assert_eq!(id.as_str(), "b");
        assert!(timers.is_empty());
    }
}
