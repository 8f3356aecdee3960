//! Live-run registry: flow id to cancel handle.
//!
//! One entry per active run. `stop` is idempotent and succeeds whether
//! or not a run is live; a canceled signal reaches the runner at its
//! next suspension point.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::id::Id;

#[derive(Default)]
pub struct RunRegistry {
    inner: Mutex<HashMap<Id, watch::Sender<bool>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run. Returns `None` if the flow already has one.
    pub fn begin(&self, flow_id: Id) -> Option<CancelSignal> {
        let mut inner = self.inner.lock();
        if inner.contains_key(&flow_id) {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        inner.insert(flow_id, tx);
        Some(CancelSignal { rx })
    }

    /// Cancel the live run if any. Returns whether one was live.
    pub fn stop(&self, flow_id: Id) -> bool {
        let inner = self.inner.lock();
        match inner.get(&flow_id) {
            Some(tx) => {
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }

    /// Remove the entry once the run returns.
    pub fn finish(&self, flow_id: Id) {
        self.inner.lock().remove(&flow_id);
    }

    pub fn is_running(&self, flow_id: Id) -> bool {
        self.inner.lock().contains_key(&flow_id)
    }
}

/// Receiver half handed to the runner.
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_canceled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the run is canceled. Never resolves if the sender
    /// is dropped without canceling.
    pub async fn canceled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn test_pair() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    #[cfg(test)]
    pub(crate) fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        std::mem::forget(tx);
        Self { rx }
    }
}
