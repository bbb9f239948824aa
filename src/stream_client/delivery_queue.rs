use std::collections::VecDeque;

use crate::{Record, SubscriptionId};

/// FIFO of records waiting to be admitted to the consumer.
#[derive(Debug, Default)]
pub(crate) struct DeliveryQueue {
    inner: VecDeque<Record>,
}

impl DeliveryQueue {
    pub fn push(&mut self, record: Record) {
        self.inner.push_back(record);
    }

    /// Puts `records` back at the head of the queue, keeping their relative order.
    pub fn requeue_front(&mut self, records: impl DoubleEndedIterator<Item = Record>) {
        for record in records.rev() {
            self.inner.push_front(record);
        }
    }

    pub fn pop(&mut self) -> Option<Record> {
        self.inner.pop_front()
    }

    /// Drops every queued record belonging to one of `stale`.
    pub fn purge(&mut self, stale: &[SubscriptionId]) -> usize {
        let before = self.inner.len();
        self.inner.retain(|record| !stale.contains(&record.subscription_id));
        before - self.inner.len()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
