use std::collections::VecDeque;

use crate::Record;

/// Delivered records whose block is not irreversible yet, oldest first.
#[derive(Clone, Debug, Default)]
pub(crate) struct FinalityBuffer {
    inner: VecDeque<Record>,
}

impl FinalityBuffer {
    pub fn push(&mut self, record: Record) {
        self.inner.push_back(record);
    }

    /// Pops every record from the front whose block is at or below `finality`.
    ///
    /// Stops at the first newer record even if older ones sit behind it.
    pub fn drain_through(&mut self, finality: u64) -> Vec<Record> {
        let mut drained = Vec::new();
        while self.inner.front().is_some_and(|record| record.block_num <= finality) {
            if let Some(mut record) = self.inner.pop_front() {
                record.irreversible = true;
                drained.push(record);
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
