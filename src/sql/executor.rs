/// Query executor - dispatches statements to clause handlers
use super::ast::*;
use super::dml::{DeleteHandler, InsertHandler, TruncateHandler, UpdateHandler};
use super::select::SelectHandler;
use crate::catalog::Catalog;
use crate::error::{EngineError, Result};
use crate::protocol::RowSink;
use crate::types::{Attribute, DefaultValue, IndexColumn, IndexDef, LiteralKind, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Executes every statement whose leading clause is `clause()`
pub trait ClauseHandler: Send + Sync {
    fn clause(&self) -> Clause;

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()>;
}

/// Error for a statement routed to the wrong handler
pub(crate) fn misrouted(clause: Clause, statement: &Statement) -> EngineError {
    EngineError::Dispatch(format!(
        "{} handler cannot execute {} statement",
        clause,
        statement.clause()
    ))
}

pub struct QueryExecutor {
    catalog: Arc<Catalog>,
    handlers: HashMap<Clause, Box<dyn ClauseHandler>>,
}

impl QueryExecutor {
    /// Executor with a handler for every clause.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let mut executor = Self {
            catalog,
            handlers: HashMap::new(),
        };
        executor.register(Box::new(CreateHandler));
        executor.register(Box::new(SelectHandler));
        executor.register(Box::new(InsertHandler));
        executor.register(Box::new(DeleteHandler));
        executor.register(Box::new(UpdateHandler));
        executor.register(Box::new(TruncateHandler));
        executor.register(Box::new(DropHandler));
        executor.register(Box::new(GrantHandler));
        executor.register(Box::new(IfHandler));
        debug_assert!(Clause::ALL.iter().all(|c| executor.handlers.contains_key(c)));
        executor
    }

    /// Install or replace the handler for its clause.
    pub fn register(&mut self, handler: Box<dyn ClauseHandler>) {
        self.handlers.insert(handler.clause(), handler);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dispatch(&self, clause: Clause) -> Result<&dyn ClauseHandler> {
        self.handlers
            .get(&clause)
            .map(|h| h.as_ref())
            .ok_or_else(|| EngineError::Dispatch(clause.to_string()))
    }

    pub fn execute(&self, statement: &Statement, sink: &mut dyn RowSink) -> Result<()> {
        let clause = statement.clause();
        debug!(%clause, "executing statement");
        self.dispatch(clause)?.execute(self, statement, sink)
    }

    /// Parse `sql` and run its statements in order. The first failure
    /// aborts the rest; statements already run keep their effects.
    pub fn execute_sql(&self, sql: &str, sink: &mut dyn RowSink) -> Result<()> {
        for statement in super::parse(sql)? {
            self.execute(&statement, sink)?;
        }
        Ok(())
    }
}

/// Build a table from its CREATE TABLE definition.
pub fn table_from_definition(create: &CreateTableStmt) -> Result<Table> {
    let mut attributes = Vec::with_capacity(create.columns.len());
    for column in &create.columns {
        let mut attribute = Attribute::new(&column.name, &column.type_name);
        for constraint in &column.constraints {
            match constraint {
                ColumnConstraint::Unique => attribute.unique = true,
                ColumnConstraint::NotNull => attribute.not_null = true,
                ColumnConstraint::PrimaryKey => {
                    attribute.unique = true;
                    attribute.not_null = true;
                }
                ColumnConstraint::AutoIncrement => attribute.auto_increment = true,
                ColumnConstraint::Default(literal) => {
                    attribute.default = Some(match literal.kind {
                        LiteralKind::Now | LiteralKind::LocalTimestamp => {
                            DefaultValue::CurrentTimestamp
                        }
                        _ => DefaultValue::Literal(literal.clone()),
                    });
                }
            }
        }
        attributes.push(attribute);
    }

    let mut table = Table::new(&create.table, attributes)?;

    // A composite key constrains the combination, which is not tracked
    let single_key = create.primary_key.len() == 1;
    for name in &create.primary_key {
        let position = table.require(name)?;
        let attribute = &mut table.attributes[position];
        attribute.not_null = true;
        if single_key {
            attribute.unique = true;
        }
    }
    Ok(table)
}

/// CREATE TABLE and CREATE INDEX
pub struct CreateHandler;

impl ClauseHandler for CreateHandler {
    fn clause(&self) -> Clause {
        Clause::Create
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        match statement {
            Statement::CreateTable(create) => {
                let table = table_from_definition(create)?;
                executor.catalog().create(table)?;
                sink.write_result(0, 1)
            }
            Statement::CreateIndex(create) => {
                let relation = executor.catalog().get(&create.table)?;
                let index = IndexDef {
                    name: create.name.clone(),
                    columns: create
                        .columns
                        .iter()
                        .map(|c| IndexColumn {
                            name: c.name.clone(),
                            nocase: c.nocase,
                        })
                        .collect(),
                    unique: create.unique,
                };
                relation.write().create_index(index)?;
                sink.write_result(0, 1)
            }
            other => Err(misrouted(self.clause(), other)),
        }
    }
}

/// DROP TABLE
pub struct DropHandler;

impl ClauseHandler for DropHandler {
    fn clause(&self) -> Clause {
        Clause::Drop
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        match statement {
            Statement::DropTable(drop) => {
                executor.catalog().drop_relation(&drop.table)?;
                sink.write_result(0, 1)
            }
            other => Err(misrouted(self.clause(), other)),
        }
    }
}

/// GRANT is accepted and does nothing
pub struct GrantHandler;

impl ClauseHandler for GrantHandler {
    fn clause(&self) -> Clause {
        Clause::Grant
    }

    fn execute(&self, _: &QueryExecutor, _: &Statement, sink: &mut dyn RowSink) -> Result<()> {
        sink.write_result(0, 0)
    }
}

/// `IF [NOT] EXISTS` guards on CREATE and DROP
pub struct IfHandler;

impl ClauseHandler for IfHandler {
    fn clause(&self) -> Clause {
        Clause::If
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let inner = executor.dispatch(statement.unguarded_clause())?;
        if inner.clause() == Clause::If {
            return Err(misrouted(self.clause(), statement));
        }
        match inner.execute(executor, statement, sink) {
            Err(EngineError::TableExists(_)) | Err(EngineError::IndexExists(_))
                if !matches!(statement, Statement::DropTable(_)) =>
            {
                sink.write_result(0, 0)
            }
            Err(EngineError::TableNotFound(_)) if matches!(statement, Statement::DropTable(_)) => {
                sink.write_result(0, 0)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Reply, ReplyCollector};

    fn run(executor: &QueryExecutor, sql: &str) -> Result<Vec<Reply>> {
        let mut collector = ReplyCollector::new();
        executor.execute_sql(sql, &mut collector)?;
        Ok(collector.into_replies())
    }

    #[test]
    fn test_every_clause_is_registered() {
        let executor = QueryExecutor::new(Arc::new(Catalog::new()));
        for clause in Clause::ALL {
            assert_eq!(executor.dispatch(clause).unwrap().clause(), clause);
        }
    }

    #[test]
    fn test_create_table_preserves_declaration_order() {
        let catalog = Arc::new(Catalog::new());
        let executor = QueryExecutor::new(catalog.clone());
        run(&executor, "CREATE TABLE t (z INT, a TEXT, m TEXT, PRIMARY KEY (a))").unwrap();

        let relation = catalog.get("t").unwrap();
        let data = relation.read();
        let names: Vec<&str> = data.table.attribute_names().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        assert!(data.table.attributes[1].unique);
        assert!(data.table.attributes[1].not_null);
    }

    #[test]
    fn test_guards_swallow_existence_errors() {
        let executor = QueryExecutor::new(Arc::new(Catalog::new()));
        run(&executor, "CREATE TABLE t (a INT)").unwrap();
        assert!(matches!(
            run(&executor, "CREATE TABLE t (a INT)"),
            Err(EngineError::TableExists(_))
        ));

        let replies = run(
            &executor,
            "CREATE TABLE IF NOT EXISTS t (a INT); DROP TABLE t; DROP TABLE IF EXISTS t",
        )
        .unwrap();
        assert_eq!(replies[0].rows_affected(), Some(0));
        assert_eq!(replies[1].rows_affected(), Some(1));
        assert_eq!(replies[2].rows_affected(), Some(0));
        assert!(matches!(run(&executor, "DROP TABLE t"), Err(EngineError::TableNotFound(_))));
    }

    #[test]
    fn test_create_index_and_grant() {
        let executor = QueryExecutor::new(Arc::new(Catalog::new()));
        let replies = run(
            &executor,
            "CREATE TABLE u (email TEXT); CREATE UNIQUE INDEX u_email ON u (email); \
             CREATE INDEX IF NOT EXISTS u_email ON u (email); GRANT SELECT ON u TO app",
        )
        .unwrap();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[2].rows_affected(), Some(0));
        assert_eq!(replies[3].rows_affected(), Some(0));
        assert!(matches!(
            run(&executor, "CREATE INDEX u_email ON u (email)"),
            Err(EngineError::IndexExists(_))
        ));
    }

    #[test]
    fn test_missing_handler_is_a_dispatch_error() {
        let executor = QueryExecutor {
            catalog: Arc::new(Catalog::new()),
            handlers: HashMap::new(),
        };
        assert!(matches!(
            run(&executor, "GRANT ALL ON t TO bob"),
            Err(EngineError::Dispatch(_))
        ));
    }
}
