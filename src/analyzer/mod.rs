//! Rule-based plan analyzer.
//!
//! The analyzer rewrites an unresolved plan into a resolved one by applying
//! its [`Rule`]s in order, pass after pass, until a pass leaves the tree
//! unchanged. The converged tree is then checked by every
//! [`ValidationRule`].

mod rules;
mod validation;

use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::error::{Error, ErrorKind};
use crate::plan::Node;
use crate::session::Context;

pub use rules::{ExpandStars, ResolveCatalogNodes, ResolveColumns, ResolveFunctions, ResolveTables};
pub use validation::{ValidateAggregates, ValidateOrderBy, ValidateResolved};

/// Default cap on rewrite passes.
pub const MAX_ITERATIONS: usize = 1000;

/// A rewrite rule. Must not mutate its input and must eventually stop
/// changing a tree it has already rewritten.
pub trait Rule: Send + Sync {
    /// Name of the rule.
    fn name(&self) -> &str;

    /// Rewrite `node`, returning the new tree.
    fn apply(&self, catalog: &Catalog, ctx: &Context, node: &Node) -> crate::error::Result<Node>;
}

/// A check run once over the converged tree.
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, node: &Node) -> crate::error::Result<()>;
}

/// Failed analysis: the error plus the best-effort plan.
///
/// The plan is the converged tree for validation failures, the tree after
/// the last pass for non-convergence, and the tree after the last successful
/// rule otherwise.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct AnalyzeError {
    pub plan: Node,
    pub source: Error,
}

impl AnalyzeError {
    pub fn new(plan: Node, source: Error) -> Self {
        Self { plan, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

impl From<AnalyzeError> for Error {
    fn from(err: AnalyzeError) -> Self {
        err.source
    }
}

/// Rewrites plans against a catalog until they converge.
pub struct Analyzer {
    catalog: Arc<Catalog>,
    rules: Vec<Box<dyn Rule>>,
    validations: Vec<Box<dyn ValidationRule>>,
    max_iterations: usize,
}

impl Analyzer {
    /// Create an analyzer with the built-in rules.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            rules: vec![
                Box::new(ResolveTables),
                Box::new(ResolveCatalogNodes),
                Box::new(ResolveFunctions),
                Box::new(ExpandStars),
                Box::new(ResolveColumns),
            ],
            validations: vec![
                Box::new(ValidateResolved),
                Box::new(ValidateOrderBy),
                Box::new(ValidateAggregates),
            ],
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Replace the rewrite rules.
    pub fn with_rules(mut self, rules: Vec<Box<dyn Rule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Append a rewrite rule, run after the existing ones.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Append a validation rule.
    pub fn add_validation(&mut self, rule: Box<dyn ValidationRule>) {
        self.validations.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Resolve and validate `node`.
    ///
    /// Analyzing an already resolved tree returns it unchanged.
    pub fn analyze(&self, ctx: &Context, node: Node) -> Result<Node, AnalyzeError> {
        let mut current = node;

        for pass in 1..=self.max_iterations {
            if let Err(err) = ctx.check() {
                return Err(AnalyzeError::new(current, err));
            }

            let mut next = current.clone();
            for rule in &self.rules {
                trace!("pass {}: applying rule {}", pass, rule.name());
                match rule.apply(&self.catalog, ctx, &next) {
                    Ok(rewritten) => next = rewritten,
                    Err(err) => {
                        debug!("rule {} failed on pass {}: {}", rule.name(), pass, err);
                        return Err(AnalyzeError::new(next, err));
                    }
                }
            }

            if next == current {
                debug!("analysis converged after {} passes", pass);
                return self.validate(current);
            }
            current = next;
        }

        debug!("analysis gave up after {} passes", self.max_iterations);
        Err(AnalyzeError::new(
            current,
            Error::NonConvergence(self.max_iterations),
        ))
    }

    fn validate(&self, node: Node) -> Result<Node, AnalyzeError> {
        for rule in &self.validations {
            if let Err(err) = rule.validate(&node) {
                debug!("validation {} failed: {}", rule.name(), err);
                return Err(AnalyzeError::new(node, err));
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, MemDatabase, MemTable, Schema, Table};
    use crate::expression::{register_defaults, Expression};
    use crate::plan::{ShowTables, SortField};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        analyzer: Analyzer,
        ctx: Context,
        table: Arc<dyn Table>,
        table2: Arc<dyn Table>,
    }

    fn fixture() -> Fixture {
        let table: Arc<dyn Table> = Arc::new(MemTable::new(
            "mytable",
            Schema::new(vec![Column::new("i", DataType::Int32)]),
        ));
        let table2: Arc<dyn Table> = Arc::new(MemTable::new(
            "mytable2",
            Schema::new(vec![Column::new("i2", DataType::Int32)]),
        ));
        let db = MemDatabase::new("mydb");
        db.add_table(table.clone());
        db.add_table(table2.clone());

        let catalog = Catalog::new();
        catalog.add_database(Arc::new(db)).unwrap();
        register_defaults(&catalog).unwrap();

        Fixture {
            analyzer: Analyzer::new(Arc::new(catalog)),
            ctx: Context::new("mydb"),
            table,
            table2,
        }
    }

    fn field_i() -> Expression {
        Expression::get_field(0, DataType::Int32, "i", false)
    }

    impl Fixture {
        fn analyze(&self, node: Node) -> Result<Node, AnalyzeError> {
            self.analyzer.analyze(&self.ctx, node)
        }
    }

    #[test]
    fn test_resolve_table() {
        let f = fixture();
        let analyzed = f.analyze(Node::unresolved_table("mytable")).unwrap();
        assert_eq!(analyzed, Node::table(f.table.clone()));
    }

    #[test]
    fn test_missing_table_returns_input() {
        let f = fixture();
        let input = Node::unresolved_table("nonexistant");
        let err = f.analyze(input.clone()).unwrap_err();
        assert_eq!(err.plan, input);
        assert!(matches!(err.source, Error::TableNotFound(ref name) if name == "nonexistant"));
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn test_resolved_tree_is_unchanged() {
        let f = fixture();
        let resolved = Node::project(vec![field_i()], Node::table(f.table.clone()));
        assert_eq!(f.analyze(resolved.clone()).unwrap(), resolved);
    }

    #[test]
    fn test_unknown_column() {
        let f = fixture();
        let node = Node::project(vec![Expression::column("o")], Node::unresolved_table("mytable"));
        let err = f.analyze(node).unwrap_err();
        assert!(matches!(err.source, Error::ColumnNotFound(_)));
    }

    #[test]
    fn test_resolve_project_and_describe() {
        let f = fixture();
        let node = Node::project(vec![Expression::column("i")], Node::unresolved_table("mytable"));
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::project(vec![field_i()], Node::table(f.table.clone()))
        );

        let node = Node::describe(Node::unresolved_table("mytable"));
        assert_eq!(f.analyze(node).unwrap(), Node::describe(Node::table(f.table.clone())));
    }

    #[test]
    fn test_expand_star() {
        let f = fixture();
        let node = Node::project(vec![Expression::Star], Node::unresolved_table("mytable"));
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::project(vec![field_i()], Node::table(f.table.clone()))
        );
    }

    #[test]
    fn test_expand_nested_star() {
        let f = fixture();
        let node = Node::project(
            vec![Expression::Star],
            Node::project(vec![Expression::Star], Node::unresolved_table("mytable")),
        );
        let analyzed = f.analyze(node).unwrap();
        assert_eq!(
            analyzed,
            Node::project(
                vec![field_i()],
                Node::project(vec![field_i()], Node::table(f.table.clone()))
            )
        );
        assert_eq!(analyzed.schema().column_names(), vec!["i"]);
    }

    #[test]
    fn test_resolve_alias() {
        let f = fixture();
        let node = Node::project(
            vec![Expression::alias(Expression::column("i"), "foo")],
            Node::unresolved_table("mytable"),
        );
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::project(
                vec![Expression::alias(field_i(), "foo")],
                Node::table(f.table.clone())
            )
        );
    }

    #[test]
    fn test_resolve_filter() {
        let f = fixture();
        let one = Expression::Literal {
            value: json!(1),
            data_type: DataType::Int32,
        };
        let node = Node::project(
            vec![Expression::column("i")],
            Node::filter(
                Expression::equals(Expression::column("i"), one.clone()),
                Node::unresolved_table("mytable"),
            ),
        );
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::project(
                vec![field_i()],
                Node::filter(Expression::equals(field_i(), one), Node::table(f.table.clone()))
            )
        );
    }

    #[test]
    fn test_resolve_cross_join_offsets() {
        let f = fixture();
        let node = Node::project(
            vec![Expression::column("i"), Expression::column("i2")],
            Node::cross_join(
                Node::unresolved_table("mytable"),
                Node::unresolved_table("mytable2"),
            ),
        );
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::project(
                vec![field_i(), Expression::get_field(1, DataType::Int32, "i2", false)],
                Node::cross_join(Node::table(f.table.clone()), Node::table(f.table2.clone()))
            )
        );
    }

    #[test]
    fn test_qualified_and_ambiguous_columns() {
        let f = fixture();
        let join = || {
            Node::cross_join(
                Node::unresolved_table("mytable"),
                Node::unresolved_table("mytable"),
            )
        };

        let node = Node::project(vec![Expression::column("i")], join());
        let err = f.analyze(node).unwrap_err();
        assert!(matches!(err.source, Error::AmbiguousColumn(_)));

        let node = Node::project(vec![Expression::qualified_column("mytable2", "i")], join());
        assert!(matches!(f.analyze(node).unwrap_err().source, Error::ColumnNotFound(_)));

        let node = Node::project(
            vec![Expression::qualified_column("mytable2", "i2")],
            Node::cross_join(
                Node::unresolved_table("mytable"),
                Node::unresolved_table("mytable2"),
            ),
        );
        let analyzed = f.analyze(node).unwrap();
        assert_eq!(analyzed.expressions()[0].name(), "i2");
    }

    #[test]
    fn test_resolve_limit() {
        let f = fixture();
        let node = Node::limit(
            1,
            Node::project(vec![Expression::column("i")], Node::unresolved_table("mytable")),
        );
        assert_eq!(
            f.analyze(node).unwrap(),
            Node::limit(1, Node::project(vec![field_i()], Node::table(f.table.clone())))
        );
    }

    #[test]
    fn test_resolve_functions() {
        let f = fixture();
        let node = Node::group_by(
            vec![Expression::function("COUNT", vec![Expression::Star])],
            vec![],
            Node::unresolved_table("mytable"),
        );
        let analyzed = f.analyze(node).unwrap();
        assert_eq!(analyzed.expressions(), vec![&Expression::count_star()]);

        let node = Node::project(
            vec![Expression::function("nope", vec![])],
            Node::unresolved_table("mytable"),
        );
        assert!(matches!(
            f.analyze(node).unwrap_err().source,
            Error::FunctionNotFound(_)
        ));
    }

    #[test]
    fn test_show_tables_binds_current_database() {
        let f = fixture();
        let analyzed = f.analyze(Node::ShowTables(ShowTables::new(None))).unwrap();
        assert!(analyzed.resolved());

        let err = f
            .analyze(Node::ShowTables(ShowTables::new(Some("other".into()))))
            .unwrap_err();
        assert!(matches!(err.source, Error::DatabaseNotFound(_)));
    }

    #[test]
    fn test_order_by_aggregate_rejected() {
        let f = fixture();
        let node = Node::sort(
            vec![SortField::asc(Expression::function("count", vec![Expression::Star]))],
            Node::group_by(
                vec![Expression::count_star()],
                vec![],
                Node::unresolved_table("mytable"),
            ),
        );
        let err = f.analyze(node).unwrap_err();
        assert!(matches!(err.source, Error::Validation(_)));
        assert!(err.plan.resolved());
    }

    struct Infinite(AtomicUsize);

    impl Rule for Infinite {
        fn name(&self) -> &str {
            "infinite"
        }

        fn apply(&self, _: &Catalog, _: &Context, _: &Node) -> crate::error::Result<Node> {
            let i = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Node::unresolved_table(format!("table{}", i)))
        }
    }

    #[test]
    fn test_max_iterations() {
        let analyzer = Analyzer::new(Arc::new(Catalog::new()))
            .with_rules(vec![Box::new(Infinite(AtomicUsize::new(0)))]);
        let err = analyzer
            .analyze(&Context::new("mydb"), Node::unresolved_table("mytable"))
            .unwrap_err();

        assert!(matches!(err.source, Error::NonConvergence(1000)));
        assert_eq!(err.plan, Node::unresolved_table("table1000"));
    }

    #[test]
    fn test_cancelled_before_analysis() {
        let f = fixture();
        f.ctx.kill_handle().kill();
        let err = f.analyze(Node::unresolved_table("mytable")).unwrap_err();
        assert!(matches!(err.source, Error::Cancelled));
        assert_eq!(err.plan, Node::unresolved_table("mytable"));
    }
}
