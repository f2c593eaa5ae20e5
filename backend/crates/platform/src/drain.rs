//! Drain tracking for in-flight tasks.
//!
//! A [`DrainGroup`] counts live [`DrainGuard`]s. Guards release on drop, so
//! a task that panics still leaves the group. [`DrainGroup::wait`] resolves
//! once the count reaches zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    idle: Notify,
}

/// Counted wait group, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct DrainGroup {
    inner: Arc<Inner>,
}

impl DrainGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one task. Keep the guard alive for as long as the task runs.
    pub fn enter(&self) -> DrainGuard {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
        DrainGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Wait until every guard has been dropped.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not lost.
            notified.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII registration in a [`DrainGroup`]
#[derive(Debug)]
pub struct DrainGuard {
    inner: Arc<Inner>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
