//! SQLite connection handle

use std::time::Duration;

use connpool_core::{PoolError, QueryResult, ResourceHandle, Result, Row, Value};
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};

/// How long a statement waits on a database locked by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One SQLite connection with JDBC-style session switches
///
/// With auto-commit disabled a transaction is opened lazily by the first
/// statement and ended by `commit`, `rollback` or re-enabling auto-commit.
/// Read-only mode maps to `PRAGMA query_only`.
pub struct SqliteHandle {
    conn: Option<RusqliteConnection>,
    path: String,
    auto_commit: bool,
    read_only: bool,
}

impl SqliteHandle {
    /// Open a SQLite database
    ///
    /// `path` is a file path, `:memory:`, or a `file:` URI. The encoding
    /// only takes effect when the database file is created.
    pub fn open(path: &str, encoding: Option<&str>) -> Result<Self> {
        tracing::debug!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                PoolError::Handle(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            if !path.starts_with("file:") {
                let file_path = std::path::Path::new(path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(PoolError::Handle(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(path, flags).map_err(|e| {
                PoolError::Handle(format!(
                    "Failed to open SQLite database at '{}': {}",
                    path, e
                ))
            })?
        };

        if let Some(encoding) = encoding {
            let encoding = sqlite_encoding(encoding)?;
            conn.pragma_update(None, "encoding", encoding)
                .map_err(|e| PoolError::Handle(format!("Failed to set encoding: {}", e)))?;
        }

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| PoolError::Handle(format!("Failed to enable foreign keys: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| PoolError::Handle(format!("Failed to set busy timeout: {}", e)))?;

        // Pooled connections share one file; WAL lets readers run alongside a writer
        if path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| PoolError::Handle(format!("Failed to set journal mode: {}", e)))?;
            conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
                PoolError::Handle(format!("Failed to set synchronous mode: {}", e))
            })?;
        }

        tracing::info!(path = %path, "SQLite database connection established");
        Ok(Self {
            conn: Some(conn),
            path: path.to_string(),
            auto_commit: true,
            read_only: false,
        })
    }

    /// Database path or URI this handle was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }

    fn conn(&self) -> Result<&RusqliteConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| PoolError::Handle(format!("SQLite connection to '{}' is closed", self.path)))
    }

    /// The connection, with a transaction opened first when auto-commit is off
    fn conn_for_statement(&self) -> Result<&RusqliteConnection> {
        let conn = self.conn()?;
        if !self.auto_commit && conn.is_autocommit() {
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| PoolError::Handle(format!("Failed to begin transaction: {}", e)))?;
            tracing::trace!(path = %self.path, "transaction started");
        }
        Ok(conn)
    }

    fn end_transaction(&self, statement: &str) -> Result<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch(statement).map_err(|e| {
                PoolError::Handle(format!("Failed to {} transaction: {}", statement.to_lowercase(), e))
            })?;
        }
        Ok(())
    }
}

impl ResourceHandle for SqliteHandle {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.conn_for_statement()?;
        let rusqlite_params = values_to_rusqlite(params);

        let rows_affected = conn
            .execute(sql, params_from_iter(rusqlite_params.iter()))
            .map_err(|e| PoolError::Handle(format!("Failed to execute statement: {}", e)))?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(rows_affected as u64)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn_for_statement()?;
        let rusqlite_params = values_to_rusqlite(params);

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| PoolError::Handle(format!("Failed to prepare query: {}", e)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = Vec::new();
        let mut query_rows = stmt
            .query(params_from_iter(rusqlite_params.iter()))
            .map_err(|e| PoolError::Handle(format!("Failed to execute query: {}", e)))?;

        while let Some(row) = query_rows
            .next()
            .map_err(|e| PoolError::Handle(format!("Failed to fetch row: {}", e)))?
        {
            let values = (0..columns.len())
                .map(|idx| rusqlite_to_value(row, idx))
                .collect::<Result<Vec<_>>>()?;
            rows.push(Row::new(values));
        }

        tracing::debug!(row_count = rows.len(), "query executed");
        Ok(QueryResult { columns, rows })
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        self.conn_for_statement()?
            .execute_batch(sql)
            .map_err(|e| PoolError::Handle(format!("Failed to execute batch: {}", e)))
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.auto_commit {
            self.end_transaction("COMMIT")?;
        }
        self.conn()?;
        self.auto_commit = enabled;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.conn()?
            .pragma_update(None, "query_only", read_only)
            .map_err(|e| PoolError::Handle(format!("Failed to set read-only mode: {}", e)))?;
        self.read_only = read_only;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(conn, e)| {
            // Keep the connection so a later close can retry
            self.conn = Some(conn);
            PoolError::Handle(format!("Failed to close SQLite database '{}': {}", self.path, e))
        })?;
        tracing::debug!(path = %self.path, "SQLite database connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl std::fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHandle")
            .field("path", &self.path)
            .field("auto_commit", &self.auto_commit)
            .field("read_only", &self.read_only)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Map a character-encoding hint to a value `PRAGMA encoding` accepts
fn sqlite_encoding(hint: &str) -> Result<&'static str> {
    match hint.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => Ok("UTF-8"),
        "utf-16" | "utf16" => Ok("UTF-16"),
        "utf-16le" | "utf16le" => Ok("UTF-16le"),
        "utf-16be" | "utf16be" => Ok("UTF-16be"),
        other => Err(PoolError::Handle(format!(
            "Unsupported SQLite encoding '{}'",
            other
        ))),
    }
}

/// Convert our Value types to rusqlite-compatible types
fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| PoolError::Handle(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_encoding_accepts_common_spellings() {
        assert_eq!(sqlite_encoding("UTF-8").expect("utf-8"), "UTF-8");
        assert_eq!(sqlite_encoding("utf8").expect("utf8"), "UTF-8");
        assert_eq!(sqlite_encoding("UTF_16LE").expect("utf-16le"), "UTF-16le");
        assert!(sqlite_encoding("cp1251").is_err());
    }

    #[test]
    fn test_in_memory_handle_starts_canonical() {
        let handle = SqliteHandle::open(":memory:", None).expect("open");
        assert!(handle.auto_commit());
        assert!(!handle.is_read_only());
        assert!(!handle.in_transaction());
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_statements_after_close_fail() {
        let mut handle = SqliteHandle::open(":memory:", None).expect("open");
        handle.close().expect("close");
        handle.close().expect("second close is a no-op");
        assert!(handle.is_closed());
        assert!(handle.execute("SELECT 1", &[]).is_err());
        assert!(handle.set_auto_commit(false).is_err());
    }
}
