// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bounded queue of pending updates

use crate::op::DplaneOp;
use crate::update::{SeqNum, UpdatePayload, UpdateRecord};
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// The queue where the host places the updates for providers to consume. It has a fixed
// capacity and can be cloned to be fed from multiple threads. Sequence numbers are
// assigned here: for a single producer they increase in queueing order.

pub struct UpdateQueue {
    queue: Arc<ArrayQueue<UpdateRecord>>,
    seqn: Arc<AtomicU64>,
}

impl Clone for UpdateQueue {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            seqn: Arc::clone(&self.seqn),
        }
    }
}

impl UpdateQueue {
    /// Create a queue. A capacity of 0 is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            seqn: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue an update, assigning it the next sequence number.
    ///
    /// # Errors
    ///
    /// Fails if the queue is full, returning the record that could not be queued.
    pub fn push(&self, op: DplaneOp, payload: UpdatePayload) -> Result<SeqNum, Box<UpdateRecord>> {
        let seqn = SeqNum(self.seqn.fetch_add(1, Ordering::Relaxed) + 1);
        self.queue
            .push(UpdateRecord::new(op, payload, seqn))
            .map(|()| seqn)
            .map_err(Box::new)
    }

    #[must_use]
    pub fn pop(&self) -> Option<UpdateRecord> {
        self.queue.pop()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
