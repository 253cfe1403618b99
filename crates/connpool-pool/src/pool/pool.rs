//! Connection pool implementation

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use connpool_core::{
    AcquireError, CloseFailure, ConfigSource, ConnectParams, Driver, DriverRegistry, PoolError,
    ReleaseError, ResourceHandle, Result,
};
use parking_lot::{Condvar, Mutex};

use super::cancel::CancelToken;
use super::connection::PooledConnection;
use super::stats::PoolStats;
use crate::PoolSettings;

/// One pooled native handle and its fixed position in the pool
pub(crate) struct Slot {
    pub(crate) id: usize,
    pub(crate) handle: Box<dyn ResourceHandle>,
    /// Set when the handle could not be reset and no replacement was opened
    pub(crate) stale: bool,
}

impl Slot {
    fn new(id: usize, handle: Box<dyn ResourceHandle>) -> Self {
        Self {
            id,
            handle,
            stale: false,
        }
    }
}

/// The two partitions plus lifecycle, guarded by one mutex
struct PoolState {
    /// Slots ready to hand out
    available: VecDeque<Slot>,
    /// Ids of slots currently lent out
    in_use: HashSet<usize>,
    /// Set by `destroy`; no further slots are handed out
    closed: bool,
    /// Threads blocked in an acquire
    waiting: usize,
}

impl PoolState {
    /// Remove the first available slot that is not stale
    fn take_healthy(&mut self) -> Option<Slot> {
        let pos = self.available.iter().position(|slot| !slot.stale)?;
        let slot = self.available.remove(pos)?;
        self.in_use.insert(slot.id);
        Some(slot)
    }

    fn take_stale(&mut self) -> Option<Slot> {
        let pos = self.available.iter().position(|slot| slot.stale)?;
        let slot = self.available.remove(pos)?;
        self.in_use.insert(slot.id);
        Some(slot)
    }

    fn has_stale(&self) -> bool {
        self.available.iter().any(|slot| slot.stale)
    }
}

/// Pause before a blocked acquire retries replacing a stale slot
const STALE_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// How long an acquire may block
#[derive(Clone, Copy)]
enum Wait {
    No,
    Forever,
    Until(Instant, Duration),
}

/// State shared between the pool and every connection it lends out
pub(crate) struct PoolShared {
    driver: Arc<dyn Driver>,
    params: ConnectParams,
    capacity: usize,
    default_timeout: Option<Duration>,
    state: Mutex<PoolState>,
    /// Signalled when a slot enters `available` or the pool closes
    slot_ready: Condvar,
    acquired_total: AtomicU64,
    released_total: AtomicU64,
    timeouts: AtomicU64,
    cancellations: AtomicU64,
}

/// A fixed-size pool of exclusive-use connections
///
/// All `capacity` connections are opened by `initialize` and live until
/// `destroy`. Each one is at any instant either available or lent to
/// exactly one caller. Callers block in `acquire` while every connection
/// is in use; fairness between blocked callers is not guaranteed.
///
/// Cloning is cheap and yields another handle to the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Open every connection described by `settings`
    ///
    /// Either all `pool_size` connections are opened and normalized
    /// (auto-commit on, read-only off) or none survive: on the first
    /// failure the connections opened so far are closed and an
    /// initialization failure is returned.
    #[tracing::instrument(skip(settings, drivers), fields(driver = %settings.driver(), capacity = settings.pool_size()))]
    pub fn initialize(settings: PoolSettings, drivers: &DriverRegistry) -> Result<Self> {
        let capacity = settings.pool_size();
        if capacity == 0 {
            return Err(PoolError::Initialization(
                "pool size must be greater than 0".into(),
            ));
        }

        let driver = drivers.get(settings.driver()).ok_or_else(|| {
            PoolError::Initialization(format!(
                "unknown driver '{}' (registered: {})",
                settings.driver(),
                drivers.list().join(", ")
            ))
        })?;
        let params = settings.connect_params();

        let mut available = VecDeque::with_capacity(capacity);
        for id in 0..capacity {
            match open_handle(driver.as_ref(), &params) {
                Ok(handle) => available.push_back(Slot::new(id, handle)),
                Err(e) => {
                    tracing::error!(slot = id, error = %e, "failed to open connection, discarding batch");
                    for mut slot in available {
                        if let Err(close_err) = slot.handle.close() {
                            tracing::warn!(slot = slot.id, error = %close_err, "failed to close discarded connection");
                        }
                    }
                    return Err(PoolError::Initialization(format!(
                        "failed to open connection {} of {}: {}",
                        id + 1,
                        capacity,
                        e
                    )));
                }
            }
        }

        tracing::info!("connection pool initialized");
        Ok(Self {
            shared: Arc::new(PoolShared {
                driver,
                params,
                capacity,
                default_timeout: settings.acquire_timeout(),
                state: Mutex::new(PoolState {
                    available,
                    in_use: HashSet::with_capacity(capacity),
                    closed: false,
                    waiting: 0,
                }),
                slot_ready: Condvar::new(),
                acquired_total: AtomicU64::new(0),
                released_total: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
                cancellations: AtomicU64::new(0),
            }),
        })
    }

    /// Read `PoolSettings` from `source`, then `initialize`
    pub fn initialize_from_source(
        source: &dyn ConfigSource,
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let settings = PoolSettings::from_source(source)?;
        Self::initialize(settings, drivers)
    }

    /// Take a connection, blocking until one is available
    ///
    /// Fails only if the pool has been destroyed (before or during the wait).
    /// Healthy connections are handed out ahead of stale ones; a stale
    /// connection whose replacement fails is put back and retried later.
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.checkout(Wait::Forever, None)
    }

    /// Take a connection, giving up after `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection> {
        let wait = match Instant::now().checked_add(timeout) {
            Some(deadline) => Wait::Until(deadline, timeout),
            None => Wait::Forever,
        };
        self.checkout(wait, None)
    }

    /// Take a connection using the configured default timeout, if any
    pub fn acquire_default(&self) -> Result<PooledConnection> {
        match self.shared.default_timeout {
            Some(timeout) => self.acquire_timeout(timeout),
            None => self.acquire(),
        }
    }

    /// Take a connection without blocking
    ///
    /// Fails with `AcquireError::Stale` when only stale connections are
    /// available and none of them can be replaced.
    pub fn try_acquire(&self) -> Result<PooledConnection> {
        self.checkout(Wait::No, None)
    }

    /// Take a connection, blocking until one is available or `token` is cancelled
    ///
    /// A cancelled wait leaves the pool untouched and fails with
    /// `AcquireError::Cancelled`.
    pub fn acquire_cancellable(&self, token: &CancelToken) -> Result<PooledConnection> {
        token.register(&self.shared);
        self.checkout(Wait::Forever, Some(token))
    }

    fn checkout(&self, wait: Wait, cancel: Option<&CancelToken>) -> Result<PooledConnection> {
        let shared = &self.shared;
        // Stale slots are skipped until this instant after a failed replacement
        let mut stale_retry_at: Option<Instant> = None;

        loop {
            let mut slot = {
                let mut state = shared.state.lock();
                loop {
                    if state.closed {
                        return Err(AcquireError::Closed.into());
                    }
                    if cancel.is_some_and(CancelToken::is_cancelled) {
                        // We may have consumed a release notification; pass it on.
                        if !state.available.is_empty() {
                            shared.slot_ready.notify_one();
                        }
                        shared.cancellations.fetch_add(1, Ordering::Relaxed);
                        return Err(AcquireError::Cancelled.into());
                    }
                    if let Some(slot) = state.take_healthy() {
                        break slot;
                    }
                    let retry_due = stale_retry_at.is_none_or(|at| Instant::now() >= at);
                    if retry_due && let Some(slot) = state.take_stale() {
                        break slot;
                    }

                    // Wake up in time to retry a stale slot even if nothing is released
                    let retry_at = stale_retry_at.filter(|_| state.has_stale());
                    match wait {
                        Wait::No => return Err(AcquireError::Exhausted.into()),
                        Wait::Forever => {
                            state.waiting += 1;
                            match retry_at {
                                Some(at) => {
                                    shared.slot_ready.wait_until(&mut state, at);
                                }
                                None => shared.slot_ready.wait(&mut state),
                            }
                            state.waiting -= 1;
                        }
                        Wait::Until(deadline, timeout) => {
                            if Instant::now() >= deadline {
                                shared.timeouts.fetch_add(1, Ordering::Relaxed);
                                return Err(AcquireError::TimedOut(timeout).into());
                            }
                            let wake = retry_at.map_or(deadline, |at| at.min(deadline));
                            state.waiting += 1;
                            shared.slot_ready.wait_until(&mut state, wake);
                            state.waiting -= 1;
                        }
                    }
                }
            };

            if slot.stale
                && let Err(e) = shared.replace_handle(&mut slot)
            {
                let id = slot.id;
                shared.put_back_stale(slot);
                if matches!(wait, Wait::No) {
                    return Err(AcquireError::Stale {
                        slot: id,
                        reason: e.to_string(),
                    }
                    .into());
                }
                tracing::warn!(slot = id, error = %e, "stale connection still unusable, waiting");
                stale_retry_at = Some(Instant::now() + STALE_RETRY_INTERVAL);
                continue;
            }

            shared.acquired_total.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(slot = slot.id, "connection acquired");
            return Ok(PooledConnection::new(slot, Arc::clone(shared)));
        }
    }

    /// Close every connection and stop lending
    ///
    /// Pending work on connections with auto-commit disabled is committed
    /// before closing. Teardown is best-effort: every connection that can
    /// be closed is closed, and the ones that failed are reported together
    /// in `PoolError::Destroy`. Threads blocked in `acquire` are woken and
    /// fail with `AcquireError::Closed`. Connections still lent out are
    /// closed when their holder releases them. Calling `destroy` again is
    /// a no-op.
    #[tracing::instrument(skip(self), fields(capacity = self.shared.capacity))]
    pub fn destroy(&self) -> Result<()> {
        let (slots, outstanding) = {
            let mut state = self.shared.state.lock();
            if state.closed {
                tracing::debug!("pool already destroyed");
                return Ok(());
            }
            state.closed = true;
            let slots: Vec<Slot> = state.available.drain(..).collect();
            (slots, state.in_use.len())
        };
        self.shared.slot_ready.notify_all();

        if outstanding > 0 {
            tracing::warn!(
                outstanding,
                "destroying pool with connections still in use; they close on release"
            );
        }

        let failures: Vec<CloseFailure> = slots
            .into_iter()
            .filter_map(|mut slot| {
                close_handle(slot.handle.as_mut())
                    .err()
                    .map(|e| CloseFailure {
                        slot: slot.id,
                        reason: e.to_string(),
                    })
            })
            .collect();

        if failures.is_empty() {
            tracing::info!("connection pool destroyed");
            Ok(())
        } else {
            tracing::warn!(failed = failures.len(), "connection pool destroyed with close failures");
            Err(PoolError::Destroy(failures))
        }
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        let (available, in_use, waiting) = {
            let state = shared.state.lock();
            (state.available.len(), state.in_use.len(), state.waiting)
        };
        PoolStats::new(shared.capacity, available, in_use, waiting).with_totals(
            shared.acquired_total.load(Ordering::Relaxed),
            shared.released_total.load(Ordering::Relaxed),
            shared.timeouts.load(Ordering::Relaxed),
            shared.cancellations.load(Ordering::Relaxed),
        )
    }

    /// Fixed number of connections owned by the pool
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn driver_name(&self) -> &str {
        self.shared.driver.name()
    }

    /// Whether `destroy` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &self.driver_name())
            .field("stats", &self.stats())
            .finish()
    }
}

impl PoolShared {
    /// Return a lent slot to the available set
    ///
    /// The handle is reset to auto-commit on (rolling back pending work)
    /// and read-only off first. A handle that cannot be reset is replaced
    /// by a freshly opened one; if that also fails the slot goes back
    /// marked stale and the reset failure is reported. After `destroy`
    /// the handle is committed and closed instead.
    pub(crate) fn check_in(&self, mut slot: Slot) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.in_use.contains(&slot.id) {
                drop(state);
                let id = slot.id;
                discard(slot);
                return Err(ReleaseError::AlreadyReleased { slot: id }.into());
            }
            if state.closed {
                state.in_use.remove(&slot.id);
                drop(state);
                return close_after_destroy(slot);
            }
        }

        let mut reset_error = None;
        if let Err(e) = reset_handle(slot.handle.as_mut()) {
            tracing::warn!(slot = slot.id, error = %e, "failed to reset connection, replacing it");
            if let Err(replace_err) = self.replace_handle(&mut slot) {
                tracing::error!(slot = slot.id, error = %replace_err, "failed to replace connection");
                slot.stale = true;
                reset_error = Some(ReleaseError::Reset {
                    slot: slot.id,
                    reason: e.to_string(),
                });
            }
        }

        let mut state = self.state.lock();
        if state.closed {
            state.in_use.remove(&slot.id);
            drop(state);
            return close_after_destroy(slot);
        }
        if state.available.len() >= self.capacity {
            state.in_use.remove(&slot.id);
            drop(state);
            discard(slot);
            return Err(ReleaseError::AvailableFull {
                capacity: self.capacity,
            }
            .into());
        }

        state.in_use.remove(&slot.id);
        tracing::trace!(slot = slot.id, "connection released");
        state.available.push_back(slot);
        drop(state);

        self.released_total.fetch_add(1, Ordering::Relaxed);
        self.slot_ready.notify_one();

        match reset_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Return a stale slot whose replacement failed
    ///
    /// Waiters are not woken: a stale slot is no reason to stop waiting.
    fn put_back_stale(&self, slot: Slot) {
        let mut state = self.state.lock();
        state.in_use.remove(&slot.id);
        if state.closed {
            drop(state);
            if let Err(e) = close_after_destroy(slot) {
                tracing::warn!(error = %e, "failed to close stale connection");
            }
            return;
        }
        state.available.push_back(slot);
    }

    /// Swap the slot's handle for a freshly opened one
    fn replace_handle(&self, slot: &mut Slot) -> Result<()> {
        let fresh = open_handle(self.driver.as_ref(), &self.params)?;
        let mut old = std::mem::replace(&mut slot.handle, fresh);
        if !old.is_closed()
            && let Err(e) = old.close()
        {
            tracing::debug!(slot = slot.id, error = %e, "failed to close replaced connection");
        }
        slot.stale = false;
        tracing::info!(slot = slot.id, "connection replaced");
        Ok(())
    }

    /// Wake every blocked acquirer so it re-checks its exit conditions
    pub(crate) fn wake_all(&self) {
        let _state = self.state.lock();
        self.slot_ready.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn mark_in_use(&self, id: usize) {
        self.state.lock().in_use.insert(id);
    }
}

/// Open a handle and bring it to the canonical state
fn open_handle(driver: &dyn Driver, params: &ConnectParams) -> Result<Box<dyn ResourceHandle>> {
    let mut handle = driver.connect(params)?;
    if let Err(e) = reset_handle(handle.as_mut()) {
        if let Err(close_err) = handle.close() {
            tracing::warn!(error = %close_err, "failed to close connection that could not be reset");
        }
        return Err(e);
    }
    Ok(handle)
}

/// Auto-commit on, read-only off; pending work is rolled back
fn reset_handle(handle: &mut dyn ResourceHandle) -> Result<()> {
    if handle.is_closed() {
        return Err(PoolError::Handle("connection is closed".into()));
    }
    if !handle.auto_commit() {
        handle.rollback()?;
        handle.set_auto_commit(true)?;
    }
    if handle.is_read_only() {
        handle.set_read_only(false)?;
    }
    Ok(())
}

/// Commit pending work if auto-commit is off, then close
fn close_handle(handle: &mut dyn ResourceHandle) -> Result<()> {
    if handle.is_closed() {
        return Ok(());
    }
    let committed = if handle.auto_commit() {
        Ok(())
    } else {
        handle.commit()
    };
    let closed = handle.close();
    committed.and(closed)
}

/// Physically close a slot released after `destroy`
fn close_after_destroy(mut slot: Slot) -> Result<()> {
    tracing::debug!(slot = slot.id, "pool destroyed, closing released connection");
    close_handle(slot.handle.as_mut()).map_err(|e| {
        PoolError::Destroy(vec![CloseFailure {
            slot: slot.id,
            reason: e.to_string(),
        }])
    })
}

/// Close a slot that cannot re-enter the pool
fn discard(mut slot: Slot) {
    tracing::error!(slot = slot.id, "connection rejected by pool, closing it");
    if let Err(e) = slot.handle.close() {
        tracing::warn!(slot = slot.id, error = %e, "failed to close rejected connection");
    }
}
