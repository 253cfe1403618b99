//! Mock driver and handles for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use connpool_core::{
    ConnectParams, Driver, DriverRegistry, PoolError, QueryResult, ResourceHandle, Result, Row,
    Value,
};
use parking_lot::Mutex;

/// What a test can observe about one mock handle
#[derive(Default)]
pub(crate) struct HandleProbe {
    pub(crate) index: usize,
    pub(crate) closed: AtomicBool,
    pub(crate) close_calls: AtomicUsize,
    /// Commits that made pending work durable
    pub(crate) commits: AtomicUsize,
    /// Rollbacks that discarded pending work
    pub(crate) rollbacks: AtomicUsize,
}

impl HandleProbe {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

/// Switches shared between a driver and every handle it opened
#[derive(Default)]
pub(crate) struct Faults {
    /// Fail `connect` once this many handles have been opened
    pub(crate) fail_open_after: Mutex<Option<usize>>,
    /// Fail every `connect`
    pub(crate) fail_open: AtomicBool,
    /// Fail `close` on the handle with this index
    pub(crate) fail_close_index: Mutex<Option<usize>>,
    /// Fail `set_read_only(false)`
    pub(crate) fail_reset: AtomicBool,
    /// Open handles with auto-commit off and read-only on
    pub(crate) dirty_on_open: AtomicBool,
}

pub(crate) struct MockHandle {
    probe: Arc<HandleProbe>,
    faults: Arc<Faults>,
    auto_commit: bool,
    read_only: bool,
    pending: usize,
    closed: bool,
}

impl MockHandle {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(PoolError::Handle("handle is closed".into()))
        } else {
            Ok(())
        }
    }
}

impl ResourceHandle for MockHandle {
    fn execute(&mut self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.check_open()?;
        if self.read_only && !sql.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            return Err(PoolError::Handle("attempt to write a readonly database".into()));
        }
        if !self.auto_commit {
            self.pending += 1;
        }
        Ok(1)
    }

    fn query(&mut self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.check_open()?;
        Ok(QueryResult {
            columns: vec!["handle".into()],
            rows: vec![Row::new(vec![Value::Int64(self.probe.index as i64)])],
        })
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            self.execute(statement, &[])?;
        }
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.check_open()?;
        if enabled && !self.auto_commit {
            self.commit()?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.check_open()?;
        if !read_only && self.faults.fail_reset.load(Ordering::SeqCst) {
            return Err(PoolError::Handle("cannot leave read-only mode".into()));
        }
        self.read_only = read_only;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        if self.pending > 0 {
            self.pending = 0;
            self.probe.commits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        if self.pending > 0 {
            self.pending = 0;
            self.probe.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        if *self.faults.fail_close_index.lock() == Some(self.probe.index) {
            return Err(PoolError::Handle(format!(
                "handle {} refused to close",
                self.probe.index
            )));
        }
        self.closed = true;
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Driver named "mock" recording every handle it opens
#[derive(Default)]
pub(crate) struct MockDriver {
    pub(crate) faults: Arc<Faults>,
    opened: Mutex<Vec<Arc<HandleProbe>>>,
}

impl MockDriver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn opened(&self) -> Vec<Arc<HandleProbe>> {
        self.opened.lock().clone()
    }

    pub(crate) fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// A registry containing only this driver
    pub(crate) fn registry(self: &Arc<Self>) -> DriverRegistry {
        DriverRegistry::new().with_driver(Arc::clone(self) as Arc<dyn Driver>)
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn ResourceHandle>> {
        let mut opened = self.opened.lock();
        let limit = *self.faults.fail_open_after.lock();
        if self.faults.fail_open.load(Ordering::SeqCst) || limit.is_some_and(|n| opened.len() >= n)
        {
            return Err(PoolError::Handle("connection refused".into()));
        }

        let probe = Arc::new(HandleProbe {
            index: opened.len(),
            ..Default::default()
        });
        opened.push(Arc::clone(&probe));

        let dirty = self.faults.dirty_on_open.load(Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            probe,
            faults: Arc::clone(&self.faults),
            auto_commit: !dirty,
            read_only: dirty,
            pending: 0,
            closed: false,
        }))
    }
}
