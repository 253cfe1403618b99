//! Bounded blocking connection pool
//!
//! A `ConnectionPool` opens a fixed number of connections through a
//! registered `Driver` and lends them out one caller at a time. Borrowed
//! connections come back when the caller releases or drops its
//! `PooledConnection`. `PoolRegistry` gives an application one explicitly
//! managed pool with an init/destroy lifecycle.

pub mod pool;
mod registry;
mod settings;

#[cfg(test)]
mod testing;

pub use pool::{CancelToken, ConnectionPool, PoolStats, PooledConnection};
pub use registry::{PoolRegistry, RegistryState};
pub use settings::{
    DEFAULT_POOL_SIZE, KEY_ACQUIRE_TIMEOUT_MS, KEY_DRIVER, KEY_ENCODING, KEY_PASSWORD,
    KEY_POOL_SIZE, KEY_URL, KEY_USER, PoolSettings,
};

pub use connpool_core::{
    AcquireError, CloseFailure, ConfigSource, DriverRegistry, PoolError, ReleaseError, Result,
};
