//! Query-scoped execution context.
//!
//! A [`Context`] is created for every query and threaded through analysis and
//! every expression evaluation. It carries the current database used to
//! resolve unqualified table names and a cancellation flag that a
//! [`KillHandle`] can raise from another thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Per-query state.
#[derive(Debug, Clone, Default)]
pub struct Context {
    id: u64,
    current_database: String,
    killed: Arc<AtomicBool>,
    /// Flags of the contexts this one was forked from.
    inherited: Vec<Arc<AtomicBool>>,
}

impl Context {
    /// Create a context whose unqualified table references resolve in
    /// `current_database`.
    pub fn new(current_database: impl Into<String>) -> Self {
        Self {
            id: 0,
            current_database: current_database.into(),
            killed: Arc::new(AtomicBool::new(false)),
            inherited: Vec::new(),
        }
    }

    /// A context with its own id and kill flag that is also cancelled when
    /// this one is.
    pub fn fork(&self, id: u64) -> Self {
        let mut inherited = self.inherited.clone();
        inherited.push(self.killed.clone());
        Self {
            id,
            current_database: self.current_database.clone(),
            killed: Arc::new(AtomicBool::new(false)),
            inherited,
        }
    }

    /// Set the query id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Query id, zero when the context is not registered with an engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn current_database(&self) -> &str {
        &self.current_database
    }

    /// A handle that cancels this query.
    pub fn kill_handle(&self) -> KillHandle {
        KillHandle(self.killed.clone())
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
            || self.inherited.iter().any(|f| f.load(Ordering::Acquire))
    }

    /// Fail with [`Error::Cancelled`] once the query has been killed.
    pub fn check(&self) -> Result<()> {
        if self.is_killed() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels the query that owns the originating [`Context`].
#[derive(Debug, Clone)]
pub struct KillHandle(Arc<AtomicBool>);

impl KillHandle {
    pub fn kill(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = Context::new("mydb");
        assert_eq!(ctx.current_database(), "mydb");
        assert_eq!(ctx.id(), 0);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_kill_handle_cancels_clones() {
        let ctx = Context::new("mydb").with_id(7);
        let clone = ctx.clone();
        ctx.kill_handle().kill();

        assert!(clone.is_killed());
        assert!(matches!(clone.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_fork_has_own_flag() {
        let parent = Context::new("mydb");
        let a = parent.fork(1);
        let b = parent.fork(2);
        assert_eq!(a.current_database(), "mydb");

        a.kill_handle().kill();
        assert!(a.is_killed());
        assert!(!b.is_killed());
        assert!(!parent.is_killed());

        parent.kill_handle().kill();
        assert!(b.is_killed());
    }
}
