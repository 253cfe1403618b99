//! SQLite driver implementation

use connpool_core::{ConnectParams, Driver, PoolError, ResourceHandle, Result};

use crate::SqliteHandle;

/// SQLite database driver
///
/// Accepts URLs of the form `sqlite:<path>`, `sqlite::memory:`,
/// `sqlite:file:<uri>` or a bare path. SQLite has no authentication, so
/// the user name and password are ignored.
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, params), fields(url = %params.url))]
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn ResourceHandle>> {
        let path = database_path(&params.url)?;
        if !params.user.is_empty() {
            tracing::trace!(user = %params.user, "SQLite ignores credentials");
        }

        let handle = SqliteHandle::open(path, params.encoding.as_deref())?;
        Ok(Box::new(handle))
    }
}

/// Strip the scheme from a connection URL, leaving what SQLite opens
fn database_path(url: &str) -> Result<&str> {
    let url = url.trim();
    let path = url
        .strip_prefix("jdbc:sqlite:")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    if path.is_empty() {
        return Err(PoolError::Handle(
            "SQLite requires a database path. Example: sqlite:/path/to/database.db".into(),
        ));
    }
    Ok(path)
}
