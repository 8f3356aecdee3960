//! In-process topic-filtered pub/sub with snapshot⊕tail subscriptions.
//!
//! One [`Streamer`] exists per event family. Publishing pushes into
//! every matching subscriber's bounded ring synchronously; a full ring
//! drops the oldest payload and bumps the subscriber's lag counter, so
//! a slow subscriber can never stall a publisher.
//!
//! **Snapshot⊕tail invariant**: [`Streamer::subscribe_with_snapshot`]
//! holds the registration gate (which publishers take in read mode)
//! across snapshot computation. No event published before snapshot
//! completion is lost, and none is seen twice.
//!
//! **Ordering invariant**: within one streamer, subscribers observe
//! events in publish order.

pub mod batch;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

pub use batch::Batched;

/// Default bound for each subscriber's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Slot<T, P> {
    filter: Filter<T>,
    queue: parking_lot::Mutex<VecDeque<(T, P)>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// One pub/sub multiplexer dedicated to a single family of events.
pub struct Streamer<T, P> {
    name: &'static str,
    capacity: usize,
    subscribers: RwLock<Vec<Arc<Slot<T, P>>>>,
}

impl<T, P> Streamer<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Deliver one event to every subscriber whose filter matches.
    ///
    /// Synchronous per subscriber: push or drop-oldest, never wait.
    /// The only suspension is the registration gate, held in read
    /// mode so concurrent publishers do not serialize behind each
    /// other — only behind an in-flight snapshot subscription.
    pub async fn publish(&self, topic: T, payload: P) {
        let subs = self.subscribers.read().await;
        for slot in subs.iter() {
            if slot.closed.load(Ordering::Acquire) || !(slot.filter)(&topic) {
                continue;
            }
            {
                let mut queue = slot.queue.lock();
                if queue.len() >= slot.capacity {
                    queue.pop_front();
                    let total = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        streamer = self.name,
                        dropped = total,
                        "subscriber lagged, dropping oldest event"
                    );
                }
                queue.push_back((topic.clone(), payload.clone()));
            }
            slot.notify.notify_one();
        }
    }

    /// Tail-only subscription.
    pub async fn subscribe<F>(&self, filter: F) -> Subscription<T, P>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let slot = self.make_slot(filter);
        let mut subs = self.subscribers.write().await;
        subs.retain(|s| !s.closed.load(Ordering::Acquire));
        subs.push(slot.clone());
        Subscription { slot }
    }

    /// Atomic snapshot + tail subscription.
    ///
    /// `snapshot` runs while publishers are blocked on the gate; the
    /// returned items are everything that existed at subscription
    /// time, and the [`Subscription`] tail starts strictly after them.
    pub async fn subscribe_with_snapshot<F, S, Fut, O, E>(
        &self,
        filter: F,
        snapshot: S,
    ) -> Result<(Vec<O>, Subscription<T, P>), E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
        S: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<O>, E>>,
    {
        let mut subs = self.subscribers.write().await;
        let items = snapshot().await?;
        subs.retain(|s| !s.closed.load(Ordering::Acquire));
        let slot = self.make_slot(filter);
        subs.push(slot.clone());
        drop(subs);
        Ok((items, Subscription { slot }))
    }

    fn make_slot<F>(&self, filter: F) -> Arc<Slot<T, P>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Arc::new(Slot {
            filter: Box::new(filter),
            queue: parking_lot::Mutex::new(VecDeque::with_capacity(self.capacity)),
            capacity: self.capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }
}

/// A live tail. Dropping it releases the queue; the streamer forgets
/// the slot on its next registration pass.
pub struct Subscription<T, P> {
    slot: Arc<Slot<T, P>>,
}

impl<T, P> Subscription<T, P> {
    /// Receive the next event, waiting if the queue is empty.
    /// Returns `None` only after [`Subscription::close`].
    pub async fn recv(&mut self) -> Option<(T, P)> {
        loop {
            {
                let mut queue = self.slot.queue.lock();
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
            }
            if self.slot.closed.load(Ordering::Acquire) {
                return None;
            }
            self.slot.notify.notified().await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<(T, P)> {
        self.slot.queue.lock().pop_front()
    }

    /// How many events were dropped because this subscriber lagged.
    pub fn dropped(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }

    /// Stop delivery. Queued events remain receivable until drained.
    pub fn close(&self) {
        self.slot.closed.store(true, Ordering::Release);
        self.slot.notify.notify_waiters();
    }
}

impl<T, P> Drop for Subscription<T, P> {
    fn drop(&mut self) {
        self.slot.closed.store(true, Ordering::Release);
    }
}
