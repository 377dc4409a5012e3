//! Query engine facade.
//!
//! [`Engine`] ties the pieces together: SQL text is parsed into an
//! unresolved plan, analyzed against the catalog, and turned into a row
//! iterator. Every query gets its own [`Context`] registered in the
//! engine's [`ProcessList`] so it can be killed while running.

mod config;
mod process;
mod result;

use std::sync::Arc;

use log::{debug, info};

use crate::analyzer::Analyzer;
use crate::catalog::{Catalog, Database, Schema};
use crate::error::{Error, Result};
use crate::expression::register_defaults;
use crate::plan::{collect_rows, Node, RowIter};
use crate::session::Context;
use crate::sql;

pub use config::EngineConfig;
pub use process::{Process, ProcessList};
pub use result::ResultSet;

use process::TrackedIter;

/// An in-memory SQL engine.
pub struct Engine {
    catalog: Arc<Catalog>,
    analyzer: Analyzer,
    config: EngineConfig,
    processes: Arc<ProcessList>,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the built-in functions registered.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::new());
        register_defaults(&catalog)?;
        let analyzer = Analyzer::new(catalog.clone()).with_max_iterations(config.max_iterations);
        Ok(Self {
            catalog,
            analyzer,
            config,
            processes: Arc::new(ProcessList::new()),
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut Analyzer {
        &mut self.analyzer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn processes(&self) -> &ProcessList {
        &self.processes
    }

    pub fn add_database(&self, database: Arc<dyn Database>) -> Result<()> {
        info!("adding database {}", database.name());
        self.catalog.add_database(database)
    }

    /// A fresh context on the configured default database, or the first
    /// registered one.
    pub fn context(&self) -> Context {
        let database = self
            .config
            .default_database
            .clone()
            .or_else(|| {
                self.catalog
                    .databases()
                    .first()
                    .map(|db| db.name().to_string())
            })
            .unwrap_or_default();
        Context::new(database).with_id(self.processes.next_id())
    }

    /// Parse and analyze `sql` into a resolved plan.
    pub fn plan(&self, ctx: &Context, sql: &str) -> Result<Node> {
        let parsed = sql::parse(sql)?;
        debug!("parsed plan:\n{}", parsed);
        let analyzed = self.analyzer.analyze(ctx, parsed)?;
        Ok(analyzed)
    }

    /// Run `sql`, returning the output schema and a lazy row iterator.
    ///
    /// The query stays in the process list until the iterator is closed or
    /// dropped. A context without an id, or whose id is already running, is
    /// tracked under a fresh id.
    pub fn query(&self, ctx: &Context, sql: &str) -> Result<(Schema, Box<dyn RowIter>)> {
        let ctx = self.processes.register(ctx, sql);
        info!("query {}: {}", ctx.id(), sql);

        let built = self
            .plan(&ctx, sql)
            .and_then(|node| Ok((node.schema(), node.row_iter(&ctx)?)));
        match built {
            Ok((schema, iter)) => Ok((
                schema,
                Box::new(TrackedIter::new(iter, self.processes.clone(), ctx.id())),
            )),
            Err(err) => {
                self.processes.remove(ctx.id());
                debug!("query {} failed: {}", ctx.id(), err);
                Err(err)
            }
        }
    }

    /// Run `sql` and collect every row.
    pub fn query_all(&self, ctx: &Context, sql: &str) -> Result<ResultSet> {
        let (schema, iter) = self.query(ctx, sql)?;
        let rows = collect_rows(iter)?;
        debug!("query {} returned {} rows", ctx.id(), rows.len());
        Ok(ResultSet::new(schema, rows))
    }

    /// The resolved plan of `sql`, rendered as an indented tree.
    pub fn explain(&self, ctx: &Context, sql: &str) -> Result<String> {
        Ok(self.plan(ctx, sql)?.to_string())
    }

    /// Cancel a running query.
    pub fn kill(&self, id: u64) -> Result<()> {
        self.processes.kill(id)
    }

    /// Run a statement, handling `KILL [QUERY|CONNECTION] <id>` itself.
    pub fn execute(&self, ctx: &Context, sql: &str) -> Result<ResultSet> {
        if let Some(id) = parse_kill(sql)? {
            self.kill(id)?;
            return Ok(ResultSet::empty());
        }
        self.query_all(ctx, sql)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .field("processes", &self.processes.len())
            .finish()
    }
}

/// Query id of a `KILL` statement, None for any other statement.
fn parse_kill(sql: &str) -> Result<Option<u64>> {
    let words: Vec<&str> = sql.trim().trim_end_matches(';').split_whitespace().collect();
    let id = match words.as_slice() {
        [kill, id] if kill.eq_ignore_ascii_case("KILL") => *id,
        [kill, kind, id]
            if kill.eq_ignore_ascii_case("KILL")
                && (kind.eq_ignore_ascii_case("QUERY") || kind.eq_ignore_ascii_case("CONNECTION")) =>
        {
            *id
        }
        [kill, ..] if kill.eq_ignore_ascii_case("KILL") => {
            return Err(sql::ParseError::InvalidKill(sql.trim().to_string()).into())
        }
        _ => return Ok(None),
    };
    id.parse()
        .map(Some)
        .map_err(|_| Error::Parse(sql::ParseError::InvalidKill(sql.trim().to_string())))
}
