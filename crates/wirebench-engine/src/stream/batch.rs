//! Coalescing adapter for client-facing sync streams.
//!
//! Events that arrive within a small window are batched into one
//! outbound message, up to a size cap; the batch is flushed
//! immediately when the cap is reached. Batching never reorders
//! events, and the final partial batch is flushed when the
//! subscription closes so clients do not miss the tail.

use std::time::Duration;

use super::Subscription;

/// Default coalescing window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(5);
/// Default per-batch size cap.
pub const DEFAULT_CAP: usize = 64;

/// Wraps a [`Subscription`] and yields batches instead of single events.
pub struct Batched<T, P> {
    sub: Subscription<T, P>,
    window: Duration,
    cap: usize,
}

impl<T, P> Batched<T, P> {
    pub fn new(sub: Subscription<T, P>) -> Self {
        Self::with_config(sub, DEFAULT_WINDOW, DEFAULT_CAP)
    }

    pub fn with_config(sub: Subscription<T, P>, window: Duration, cap: usize) -> Self {
        Self { sub, window, cap }
    }

    /// Next batch, or `None` once the subscription closed and drained.
    ///
    /// Waits for the first event, then collects everything that
    /// arrives within the window, flushing early at the cap.
    pub async fn next(&mut self) -> Option<Vec<(T, P)>> {
        let first = self.sub.recv().await?;
        let mut batch = vec![first];

        let deadline = tokio::time::Instant::now() + self.window;
        while batch.len() < self.cap {
            match tokio::time::timeout_at(deadline, self.sub.recv()).await {
                Ok(Some(item)) => batch.push(item),
                // Closed mid-window: return what we have; the next call
                // observes the close.
                Ok(None) => break,
                Err(_) => break,
            }
        }
        Some(batch)
    }

    /// Drop count forwarded from the underlying subscription.
    pub fn dropped(&self) -> u64 {
        self.sub.dropped()
    }
}
