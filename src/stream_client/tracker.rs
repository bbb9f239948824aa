use std::collections::{HashMap, VecDeque};

use tokio_util::time::delay_queue::Key;

use crate::{
    DeliveryMode, Record, StreamRequest, SubscriptionId,
    stream_client::gate::{GraceTimers, LiveGate},
};

/// Progress of one accepted subscription.
#[derive(Debug)]
pub(crate) struct TrackedRequest {
    pub request: StreamRequest,
    pub gate: LiveGate,
    pub delivery_counter: u64,
    pub filtered_count: u64,
    /// Unknown until the first `trace_init` arrives.
    pub expected_history_total: Option<u64>,
    pub first_block: Option<u64>,
    pub pending_live: VecDeque<Record>,
}

/// Outcome of presenting a dequeued record to its subscription's gate.
#[derive(Debug)]
pub(crate) enum Admission {
    Deliver { record: Record, switched_to_live: bool },
    Held,
}

impl TrackedRequest {
    pub fn new(request: StreamRequest) -> Self {
        Self {
            request,
            gate: LiveGate::Created,
            delivery_counter: 0,
            filtered_count: 0,
            expected_history_total: None,
            first_block: None,
            pending_live: VecDeque::new(),
        }
    }

    pub fn started(&self) -> bool {
        self.gate != LiveGate::Created
    }

    /// Runs the gate for a record taken off the delivery queue.
    pub fn admit(&mut self, record: Record, timers: &mut GraceTimers) -> Admission {
        let mut switched_to_live = false;

        if self.gate == LiveGate::Created {
            if record.mode == DeliveryMode::Live {
                self.gate = LiveGate::Live;
                switched_to_live = true;
            } else {
                self.gate = LiveGate::AwaitingHistory;
            }
        }

        if record.mode == DeliveryMode::History {
            self.delivery_counter += 1;
            let accounted = self.delivery_counter + self.filtered_count;
            if self.expected_history_total == Some(accounted) {
                if self.gate == LiveGate::AwaitingHistory {
                    let key = timers.arm(record.subscription_id.clone());
                    self.gate = LiveGate::GraceArmed(key);
                    debug!(
                        subscription_id = %record.subscription_id,
                        delivered = self.delivery_counter,
                        filtered = self.filtered_count,
                        "History complete, grace timer armed"
                    );
                }
            } else {
                self.cancel_grace(timers);
            }
        }

        if record.mode == DeliveryMode::Live && !self.gate.is_live() {
            trace!(
                subscription_id = %record.subscription_id,
                block_num = record.block_num,
                pending = self.pending_live.len() + 1,
                "Holding live record until history completes"
            );
            self.pending_live.push_back(record);
            return Admission::Held;
        }

        Admission::Deliver { record, switched_to_live }
    }

    /// Records a `trace_init`: the first announces the backfill size, later ones extend it.
    pub fn announce_history(
        &mut self,
        results: u64,
        first_block: Option<u64>,
        timers: &mut GraceTimers,
    ) {
        match self.expected_history_total {
            None => {
                self.expected_history_total = Some(results);
                self.first_block = first_block;
            }
            Some(total) => {
                self.expected_history_total = Some(total + results);
                self.cancel_grace(timers);
            }
        }
    }

    /// Completes the grace period. Returns the held live records, oldest first, or `None` if
    /// `key` no longer matches the armed timer.
    pub fn go_live(&mut self, key: &Key) -> Option<Vec<Record>> {
        match &self.gate {
            LiveGate::GraceArmed(armed) if armed == key => {
                self.gate = LiveGate::Live;
                Some(self.pending_live.drain(..).collect())
            }
            _ => None,
        }
    }

    /// `GraceArmed -> AwaitingHistory`.
    pub fn cancel_grace(&mut self, timers: &mut GraceTimers) {
        if let LiveGate::GraceArmed(key) = &self.gate {
            timers.cancel(key);
            self.gate = LiveGate::AwaitingHistory;
        }
    }
}

/// Subscriptions accepted on the current connection, in acceptance order.
#[derive(Debug, Default)]
pub(crate) struct RequestTracker {
    tracked: HashMap<SubscriptionId, TrackedRequest>,
    accepted: Vec<SubscriptionId>,
}

impl RequestTracker {
    pub fn accept(&mut self, id: SubscriptionId, request: StreamRequest) {
        if self.tracked.insert(id.clone(), TrackedRequest::new(request)).is_none() {
            self.accepted.push(id);
        }
    }

    pub fn get_mut(&mut self, id: &SubscriptionId) -> Option<&mut TrackedRequest> {
        self.tracked.get_mut(id)
    }

    /// Iterates tracked requests in acceptance order.
    pub fn iter(&self) -> impl Iterator<Item = (&SubscriptionId, &TrackedRequest)> {
        self.accepted.iter().filter_map(|id| self.tracked.get(id).map(|tracked| (id, tracked)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedRequest> {
        self.tracked.values_mut()
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// Returns `true` once `finality` has passed the `read_until` of any tracked request.
    pub fn bound_exceeded(&self, finality: u64) -> bool {
        self.tracked.values().any(|tracked| tracked.request.bound_exceeded(finality))
    }

    /// Removes every tracked request, returning the stale ids and the requests to replay.
    pub fn take_accepted(&mut self) -> (Vec<SubscriptionId>, Vec<StreamRequest>) {
        let ids = std::mem::take(&mut self.accepted);
        let requests =
            ids.iter().filter_map(|id| self.tracked.remove(id)).map(|t| t.request).collect();
        self.tracked.clear();
        (ids, requests)
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.accepted.clear();
    }
}
