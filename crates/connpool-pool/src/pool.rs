//! Bounded blocking connection pool
//!
//! This module provides a fixed-size pool of exclusive-use connections
//! shared across threads, with blocking, timed, non-blocking and
//! cancellable acquisition.
//!
//! # Example
//!
//! ```ignore
//! use connpool_pool::{ConnectionPool, PoolSettings};
//!
//! let settings = PoolSettings::new("sqlite", "sqlite:admission.db").with_pool_size(5);
//! let pool = ConnectionPool::initialize(settings, &drivers)?;
//!
//! let mut conn = pool.acquire()?;
//! conn.execute("UPDATE faculty SET plan = ? WHERE id = ?", &[40.into(), 3.into()])?;
//! conn.release()?;
//!
//! pool.destroy()?;
//! ```

mod cancel;
mod connection;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use cancel::CancelToken;
pub use connection::PooledConnection;
pub use pool::ConnectionPool;
pub use stats::PoolStats;
