//! Running query registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;

use crate::catalog::Row;
use crate::error::{Error, Result};
use crate::plan::RowIter;
use crate::session::{Context, KillHandle};

/// A query registered with the engine.
#[derive(Debug, Clone)]
pub struct Process {
    pub id: u64,
    pub query: String,
    pub started: DateTime<Utc>,
    handle: KillHandle,
}

/// Ids and kill handles of running queries.
#[derive(Debug)]
pub struct ProcessList {
    next_id: AtomicU64,
    processes: Mutex<HashMap<u64, Process>>,
}

impl Default for ProcessList {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            processes: Mutex::new(HashMap::new()),
        }
    }
}

impl ProcessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh query id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Track the query owning `ctx`, returning the context it is tracked
    /// under. A context without an id, or whose id is already running, is
    /// forked under a fresh id.
    pub fn register(&self, ctx: &Context, query: &str) -> Context {
        let mut processes = self.processes.lock();
        let ctx = if ctx.id() == 0 || processes.contains_key(&ctx.id()) {
            ctx.fork(self.next_id())
        } else {
            ctx.clone()
        };
        debug!("registering query {}", ctx.id());
        processes.insert(
            ctx.id(),
            Process {
                id: ctx.id(),
                query: query.to_string(),
                started: Utc::now(),
                handle: ctx.kill_handle(),
            },
        );
        ctx
    }

    /// Stop tracking a query. Unknown ids are ignored.
    pub fn remove(&self, id: u64) {
        if self.processes.lock().remove(&id).is_some() {
            debug!("query {} finished", id);
        }
    }

    /// Cancel a running query.
    pub fn kill(&self, id: u64) -> Result<()> {
        let processes = self.processes.lock();
        let process = processes.get(&id).ok_or(Error::QueryNotFound(id))?;
        info!("killing query {}: {}", id, process.query);
        process.handle.kill();
        Ok(())
    }

    /// Running queries ordered by id.
    pub fn list(&self) -> Vec<Process> {
        let mut list: Vec<Process> = self.processes.lock().values().cloned().collect();
        list.sort_by_key(|p| p.id);
        list
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }
}

/// Unregisters its query once closed or dropped.
pub(crate) struct TrackedIter {
    inner: Box<dyn RowIter>,
    processes: Arc<ProcessList>,
    id: u64,
}

impl TrackedIter {
    pub(crate) fn new(inner: Box<dyn RowIter>, processes: Arc<ProcessList>, id: u64) -> Self {
        Self {
            inner,
            processes,
            id,
        }
    }
}

impl RowIter for TrackedIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.inner.next_row()
    }

    fn close(&mut self) -> Result<()> {
        let result = self.inner.close();
        self.processes.remove(self.id);
        result
    }
}

impl Drop for TrackedIter {
    fn drop(&mut self) {
        self.processes.remove(self.id);
    }
}
