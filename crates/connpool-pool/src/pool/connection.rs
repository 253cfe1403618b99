//! Connections lent out by the pool

use std::sync::Arc;

use connpool_core::{PoolError, QueryResult, ReleaseError, ResourceHandle, Result, Value};

use super::pool::{PoolShared, Slot};

/// A connection borrowed from a `ConnectionPool`
///
/// Forwards the operations callers need to the pooled native handle.
/// Releasing it (`release`, `close`, or dropping it) returns the handle to
/// the pool rather than closing it; the physical close only happens when
/// the pool is destroyed.
pub struct PooledConnection {
    slot: Option<Slot>,
    slot_id: usize,
    pool: Arc<PoolShared>,
}

impl PooledConnection {
    pub(crate) fn new(slot: Slot, pool: Arc<PoolShared>) -> Self {
        Self {
            slot_id: slot.id,
            slot: Some(slot),
            pool,
        }
    }

    /// Position of the underlying handle in the pool
    pub fn id(&self) -> usize {
        self.slot_id
    }

    /// Whether this connection has already been handed back
    pub fn is_released(&self) -> bool {
        self.slot.is_none()
    }

    fn handle(&self) -> Result<&dyn ResourceHandle> {
        match &self.slot {
            Some(slot) => Ok(slot.handle.as_ref()),
            None => Err(returned_to_pool(self.slot_id)),
        }
    }

    fn handle_mut(&mut self) -> Result<&mut dyn ResourceHandle> {
        match &mut self.slot {
            Some(slot) => Ok(slot.handle.as_mut()),
            None => Err(returned_to_pool(self.slot_id)),
        }
    }

    /// Execute a statement that modifies data, returning the affected row count
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.handle_mut()?.execute(sql, params)
    }

    /// Execute a query that returns rows
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.handle_mut()?.query(sql, params)
    }

    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.handle_mut()?.execute_batch(sql)
    }

    pub fn auto_commit(&self) -> Result<bool> {
        Ok(self.handle()?.auto_commit())
    }

    /// Switch auto-commit mode. It is switched back on when the connection
    /// returns to the pool.
    pub fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.handle_mut()?.set_auto_commit(enabled)
    }

    pub fn is_read_only(&self) -> Result<bool> {
        Ok(self.handle()?.is_read_only())
    }

    /// Switch read-only mode. It is switched back off when the connection
    /// returns to the pool.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.handle_mut()?.set_read_only(read_only)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.handle_mut()?.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.handle_mut()?.rollback()
    }

    /// Return the connection to the pool, leaving this value empty
    ///
    /// Work left uncommitted with auto-commit disabled is rolled back.
    /// A second call fails with `ReleaseError::AlreadyReleased`, and every
    /// other operation fails once the connection is closed.
    pub fn close(&mut self) -> Result<()> {
        match self.slot.take() {
            Some(slot) => self.pool.check_in(slot),
            None => Err(ReleaseError::AlreadyReleased {
                slot: self.slot_id,
            }
            .into()),
        }
    }

    /// Return the connection to the pool
    pub fn release(mut self) -> Result<()> {
        self.close()
    }
}

fn returned_to_pool(slot: usize) -> PoolError {
    PoolError::Handle(format!(
        "connection in slot {} has been returned to the pool",
        slot
    ))
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take()
            && let Err(e) = self.pool.check_in(slot)
        {
            tracing::error!(slot = self.slot_id, error = %e, "failed to return dropped connection to pool");
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("slot", &self.slot_id)
            .field("released", &self.is_released())
            .finish()
    }
}
