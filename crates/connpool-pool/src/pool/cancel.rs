//! Cancellation of blocked acquisitions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::pool::PoolShared;

/// Cancels acquisitions that wait on it, from any thread
///
/// A token is the pool's equivalent of interrupting a blocked thread: pass
/// it to `ConnectionPool::acquire_cancellable` and call `cancel` from
/// elsewhere. Cancellation is sticky; once cancelled, every later
/// acquisition using the token fails immediately.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    /// Pools with a waiter currently parked on this token
    pools: Mutex<Vec<Weak<PoolShared>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every acquisition waiting on this token
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let pools = std::mem::take(&mut *self.inner.pools.lock());
        tracing::debug!(pools = pools.len(), "cancelling waiting acquisitions");
        for pool in pools.iter().filter_map(Weak::upgrade) {
            pool.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Record that a waiter is about to block on `pool`
    ///
    /// Must happen before the waiter's first `is_cancelled` check so a
    /// concurrent `cancel` either sees the pool or is seen by the waiter.
    pub(crate) fn register(&self, pool: &Arc<PoolShared>) {
        let mut pools = self.inner.pools.lock();
        pools.retain(|p| p.strong_count() > 0);
        if !pools.iter().any(|p| std::ptr::eq(p.as_ptr(), Arc::as_ptr(pool))) {
            pools.push(Arc::downgrade(pool));
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
