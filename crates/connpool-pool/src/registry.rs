//! Application-owned home of the connection pool
//!
//! `PoolRegistry` replaces a process-wide pool singleton: the composition
//! root builds one from a `DriverRegistry` and a `ConfigSource`, brings the
//! pool up with `init_connection_pool` and tears it down with
//! `destroy_connection_pool`. Everything else asks the registry for the pool.

use connpool_core::{ConfigSource, DriverRegistry, PoolError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{ConnectionPool, PoolSettings, PooledConnection};

/// Lifecycle phase of a `PoolRegistry`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryState {
    Uninitialized,
    Active,
    Destroyed,
}

enum Lifecycle {
    Uninitialized,
    Active(ConnectionPool),
    Destroyed,
}

impl Lifecycle {
    fn state(&self) -> RegistryState {
        match self {
            Lifecycle::Uninitialized => RegistryState::Uninitialized,
            Lifecycle::Active(_) => RegistryState::Active,
            Lifecycle::Destroyed => RegistryState::Destroyed,
        }
    }
}

/// Owns the single connection pool of an application
pub struct PoolRegistry {
    drivers: DriverRegistry,
    source: Box<dyn ConfigSource>,
    lifecycle: RwLock<Lifecycle>,
}

impl PoolRegistry {
    pub fn new(drivers: DriverRegistry, source: Box<dyn ConfigSource>) -> Self {
        Self {
            drivers,
            source,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    /// Read the pool settings and open every connection
    ///
    /// Only valid once: a registry whose pool is active or already
    /// destroyed fails with `PoolError::Initialization`.
    #[tracing::instrument(skip(self))]
    pub fn init_connection_pool(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.write();
        match *lifecycle {
            Lifecycle::Uninitialized => {}
            Lifecycle::Active(_) => {
                return Err(PoolError::Initialization(
                    "connection pool is already initialized".into(),
                ));
            }
            Lifecycle::Destroyed => {
                return Err(PoolError::Initialization(
                    "connection pool has been destroyed".into(),
                ));
            }
        }

        let settings = PoolSettings::from_source(self.source.as_ref())?;
        tracing::debug!(?settings, "initializing connection pool");
        let pool = ConnectionPool::initialize(settings, &self.drivers)?;
        *lifecycle = Lifecycle::Active(pool);
        Ok(())
    }

    /// Destroy the active pool
    ///
    /// The registry moves to `Destroyed` even when some connections fail to
    /// close; those failures are returned as `PoolError::Destroy`.
    #[tracing::instrument(skip(self))]
    pub fn destroy_connection_pool(&self) -> Result<()> {
        let pool = {
            let mut lifecycle = self.lifecycle.write();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Destroyed) {
                Lifecycle::Active(pool) => pool,
                other => {
                    let state = other.state();
                    *lifecycle = other;
                    return Err(PoolError::Lifecycle(format!(
                        "no active connection pool to destroy (state: {:?})",
                        state
                    )));
                }
            }
        };
        pool.destroy()
    }

    /// The active pool
    pub fn pool(&self) -> Result<ConnectionPool> {
        match &*self.lifecycle.read() {
            Lifecycle::Active(pool) => Ok(pool.clone()),
            Lifecycle::Uninitialized => Err(PoolError::Lifecycle(
                "connection pool has not been initialized".into(),
            )),
            Lifecycle::Destroyed => Err(PoolError::Lifecycle(
                "connection pool has been destroyed".into(),
            )),
        }
    }

    /// Take a connection from the active pool, blocking until one is free
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.pool()?.acquire()
    }

    pub fn state(&self) -> RegistryState {
        self.lifecycle.read().state()
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("drivers", &self.drivers.list())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests;
