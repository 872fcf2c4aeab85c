use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
};

use tokio::{
    select,
    sync::Notify,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;

use super::lock;
use crate::{AgentId, Envelope, Error, Payload, Priority, Result, Status, meta::Timestamp};

/// Heap entry: most urgent priority first, then arrival order.
struct Queued<P: Payload> {
    priority: Priority,
    seq: u64,
    envelope: Envelope<P>,
}

impl<P: Payload> PartialEq for Queued<P> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<P: Payload> Eq for Queued<P> {}

impl<P: Payload> PartialOrd for Queued<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Payload> Ord for Queued<P> {
    // BinaryHeap pops the greatest element, so both keys are reversed.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Queue<P: Payload> {
    heap: BinaryHeap<Queued<P>>,
    next_seq: u64,
}

/// Result of waiting on a mailbox.
pub(crate) struct Popped<P: Payload> {
    pub envelope: Option<Envelope<P>>,
    /// Expired envelopes discarded while looking for a live one.
    pub expired: usize,
}

/// Priority-ordered queue of envelopes waiting for one agent.
///
/// Any number of producers may `push` concurrently; consumers `pop` and suspend
/// on a [`Notify`] until an envelope arrives, the deadline passes, the mailbox
/// is closed or the broker is cancelled. A pop either removes exactly one live
/// envelope or leaves the queue untouched.
pub(crate) struct Mailbox<P: Payload> {
    owner: AgentId,
    queue: Mutex<Queue<P>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

impl<P: Payload> Mailbox<P> {
    pub fn new(owner: AgentId, capacity: usize) -> Self {
        Self {
            owner,
            queue: Mutex::new(Queue {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    pub fn owner(&self) -> &AgentId {
        &self.owner
    }

    pub fn push(&self, envelope: Envelope<P>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::MailboxClosed(self.owner.clone()));
        }
        {
            let mut queue = lock(&self.queue);
            if queue.heap.len() >= self.capacity {
                return Err(Error::MailboxFull(self.owner.clone(), self.capacity));
            }
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(Queued {
                priority: envelope.priority(),
                seq,
                envelope,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the most urgent live envelope without waiting.
    ///
    /// Expired envelopes met on the way are marked expired and dropped.
    pub fn try_pop(&self) -> Popped<P> {
        let mut queue = lock(&self.queue);
        let mut expired = 0;
        while let Some(Queued { mut envelope, .. }) = queue.heap.pop() {
            if envelope.is_expired() {
                envelope.advance(Status::Expired);
                expired += 1;
                continue;
            }
            return Popped {
                envelope: Some(envelope),
                expired,
            };
        }
        Popped {
            envelope: None,
            expired,
        }
    }

    /// Wait for an envelope until `deadline` (forever if `None`).
    pub async fn pop(&self, deadline: Option<Instant>, cancel: &CancellationToken) -> Popped<P> {
        let timeout = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timeout);

        let mut expired = 0;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = self.try_pop();
            expired += popped.expired;
            if popped.envelope.is_some() || self.is_closed() || cancel.is_cancelled() {
                return Popped {
                    envelope: popped.envelope,
                    expired,
                };
            }

            select! {
                _ = &mut notified => continue,
                _ = cancel.cancelled() => {},
                _ = &mut timeout => {},
            }
            return Popped {
                envelope: None,
                expired,
            };
        }
    }

    /// Swap in an empty queue, returning how many envelopes were discarded.
    pub fn clear(&self) -> usize {
        let mut queue = lock(&self.queue);
        std::mem::take(&mut queue.heap).len()
    }

    /// Remove every envelope whose deadline is before `now`, returning them
    /// marked expired.
    pub fn sweep_expired(&self, now: Timestamp) -> Vec<Envelope<P>> {
        let mut queue = lock(&self.queue);
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut queue.heap)
            .into_iter()
            .partition(|queued| queued.envelope.is_expired_at(now));
        queue.heap = BinaryHeap::from(live);
        expired
            .into_iter()
            .map(|Queued { mut envelope, .. }| {
                envelope.advance(Status::Expired);
                envelope
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.queue).heap.len()
    }

    /// Refuse further pushes and wake every waiting consumer.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }
}
