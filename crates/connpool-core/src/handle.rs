//! Native handle and driver traits
//!
//! A `ResourceHandle` is the expensive object being pooled, such as a
//! database connection. Handles are created by a `Driver` and are never
//! exposed to pool callers directly.

use std::fmt;

use crate::{QueryResult, Result, Value};

/// Parameters a driver needs to open one handle
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    /// Connection URL understood by the driver
    pub url: String,
    /// User name
    pub user: String,
    /// Password
    pub password: String,
    /// Optional character-encoding hint
    pub encoding: Option<String>,
}

impl ConnectParams {
    /// Create parameters for the given URL with empty credentials
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// A native connection owned by the pool
///
/// Handles are used by one thread at a time but move between threads as
/// they are lent out, so implementations must be `Send`.
pub trait ResourceHandle: Send {
    /// Execute a statement that modifies data, returning the affected row count
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query that returns rows
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute several statements separated by semicolons
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// Whether every statement commits on its own
    fn auto_commit(&self) -> bool;

    /// Switch auto-commit mode. Enabling it commits any pending work.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Whether the handle rejects writes
    fn is_read_only(&self) -> bool;

    fn set_read_only(&mut self, read_only: bool) -> Result<()>;

    /// Commit pending work. A no-op in auto-commit mode.
    fn commit(&mut self) -> Result<()>;

    /// Discard pending work. A no-op in auto-commit mode.
    fn rollback(&mut self) -> Result<()>;

    /// Physically close the handle
    fn close(&mut self) -> Result<()>;

    /// Check if the handle is closed
    fn is_closed(&self) -> bool;
}

/// Opens native handles for one kind of data store
pub trait Driver: Send + Sync {
    /// Identifier used to look the driver up (e.g., "sqlite")
    fn name(&self) -> &str;

    /// Open a new handle
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn ResourceHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_debug_redacts_password() {
        let params = ConnectParams::new("sqlite::memory:").with_credentials("faculty", "s3cret");
        let debug = format!("{:?}", params);
        assert!(debug.contains("faculty"));
        assert!(!debug.contains("s3cret"));
    }
}
