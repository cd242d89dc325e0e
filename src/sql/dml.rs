/// INSERT, UPDATE, DELETE and TRUNCATE handlers
use super::ast::{Clause, Condition, Statement};
use super::evaluator::{build_predicates, eval_all, key, Predicate, Scope};
use super::executor::{misrouted, ClauseHandler, QueryExecutor};
use super::join::VirtualRow;
use crate::error::Result;
use crate::protocol::RowSink;
use crate::storage::{RelationData, Tuple};

/// Predicates of a single-table statement with the keys to bind them.
struct RowFilter {
    keys: Vec<String>,
    predicates: Vec<Predicate>,
}

impl RowFilter {
    fn new(data: &RelationData, conditions: &[Condition]) -> Result<Self> {
        let table = &data.table;
        let mut scope = Scope::new();
        scope.push(&table.name, table.attribute_names().map(String::from).collect());
        Ok(Self {
            keys: table.attribute_names().map(|a| key(&table.name, a)).collect(),
            predicates: build_predicates(conditions, &scope)?,
        })
    }

    fn matches(&self, tuple: &Tuple) -> Result<bool> {
        let row: VirtualRow = self
            .keys
            .iter()
            .cloned()
            .zip(tuple.values.iter().cloned())
            .collect();
        eval_all(&self.predicates, &row)
    }
}

/// INSERT INTO ... VALUES ... [RETURNING col]
pub struct InsertHandler;

impl ClauseHandler for InsertHandler {
    fn clause(&self) -> Clause {
        Clause::Insert
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Statement::Insert(insert) = statement else {
            return Err(misrouted(self.clause(), statement));
        };
        let relation = executor.catalog().get(&insert.table)?;

        let mut last_id = 0;
        let mut returned = Vec::new();
        {
            let mut data = relation.write();
            for values in &insert.rows {
                let outcome = data.insert(&insert.columns, values, insert.returning.as_deref())?;
                if let Some(value) = outcome.returned {
                    last_id = value.as_i64().unwrap_or(last_id);
                    returned.push(value.to_string());
                } else if let Some(id) = outcome.auto_id {
                    last_id = id;
                }
            }
        }

        match &insert.returning {
            Some(column) => {
                sink.write_row_header(vec![column.clone()])?;
                for value in returned {
                    sink.write_row(vec![value])?;
                }
                sink.write_row_end()
            }
            None => sink.write_result(last_id, insert.rows.len() as i64),
        }
    }
}

/// UPDATE ... SET ... [WHERE ...]
pub struct UpdateHandler;

impl ClauseHandler for UpdateHandler {
    fn clause(&self) -> Clause {
        Clause::Update
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Statement::Update(update) = statement else {
            return Err(misrouted(self.clause(), statement));
        };
        let relation = executor.catalog().get(&update.table)?;
        let updated = {
            let mut data = relation.write();
            let filter = RowFilter::new(&data, &update.where_clause)?;
            data.update_where(&update.assignments, |tuple| filter.matches(tuple))?
        };
        sink.write_result(0, updated as i64)
    }
}

/// DELETE FROM ... [WHERE ...]; without WHERE every row goes
pub struct DeleteHandler;

impl ClauseHandler for DeleteHandler {
    fn clause(&self) -> Clause {
        Clause::Delete
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Statement::Delete(delete) = statement else {
            return Err(misrouted(self.clause(), statement));
        };
        let relation = executor.catalog().get(&delete.table)?;
        let removed = {
            let mut data = relation.write();
            if delete.where_clause.is_empty() {
                data.truncate()
            } else {
                let filter = RowFilter::new(&data, &delete.where_clause)?;
                data.delete_where(|tuple| filter.matches(tuple))?
            }
        };
        sink.write_result(0, removed as i64)
    }
}

/// TRUNCATE [TABLE] name
pub struct TruncateHandler;

impl ClauseHandler for TruncateHandler {
    fn clause(&self) -> Clause {
        Clause::Truncate
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Statement::Truncate(truncate) = statement else {
            return Err(misrouted(self.clause(), statement));
        };
        let relation = executor.catalog().get(&truncate.table)?;
        let removed = relation.write().truncate();
        sink.write_result(0, removed as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::error::EngineError;
    use crate::protocol::{Reply, ReplyCollector};
    use std::sync::Arc;

    fn executor() -> QueryExecutor {
        let executor = QueryExecutor::new(Arc::new(Catalog::new()));
        run(
            &executor,
            "CREATE TABLE t (id INT PRIMARY KEY AUTOINCREMENT, name TEXT, score DECIMAL DEFAULT 0)",
        )
        .unwrap();
        executor
    }

    fn run(executor: &QueryExecutor, sql: &str) -> Result<Vec<Reply>> {
        let mut collector = ReplyCollector::new();
        executor.execute_sql(sql, &mut collector)?;
        Ok(collector.into_replies())
    }

    fn names(executor: &QueryExecutor) -> Vec<String> {
        let relation = executor.catalog().get("t").unwrap();
        let data = relation.read();
        data.rows.iter().map(|r| r.values[1].to_string()).collect()
    }

    #[test]
    fn test_insert_reports_last_id() {
        let executor = executor();
        let replies = run(&executor, "INSERT INTO t (name) VALUES ('a'), ('b')").unwrap();
        assert_eq!(
            replies,
            vec![Reply::Result {
                last_id: 2,
                rows_affected: 2
            }]
        );
    }

    #[test]
    fn test_insert_returning_writes_rows() {
        let executor = executor();
        let replies = run(&executor, "INSERT INTO t (name) VALUES ('a'), ('b') RETURNING id").unwrap();
        assert_eq!(
            replies,
            vec![Reply::Rows {
                header: vec!["id".into()],
                rows: vec![vec!["1".into()], vec!["2".into()]],
            }]
        );
    }

    #[test]
    fn test_delete_where_and_delete_all() {
        let executor = executor();
        run(&executor, "INSERT INTO t (name) VALUES ('a'), ('b'), ('c')").unwrap();

        let replies = run(&executor, "DELETE FROM t WHERE id = 1").unwrap();
        assert_eq!(replies[0].rows_affected(), Some(1));
        assert_eq!(names(&executor), vec!["b", "c"]);

        let replies = run(&executor, "DELETE FROM t").unwrap();
        assert_eq!(replies[0].rows_affected(), Some(2));
        assert!(names(&executor).is_empty());
    }

    #[test]
    fn test_update_with_where() {
        let executor = executor();
        run(&executor, "INSERT INTO t (name, score) VALUES ('a', 1.5), ('b', 2)").unwrap();
        let replies = run(&executor, "UPDATE t SET name = 'z' WHERE score > 1.7").unwrap();
        assert_eq!(replies[0].rows_affected(), Some(1));
        assert_eq!(names(&executor), vec!["a", "z"]);
    }

    #[test]
    fn test_truncate_twice() {
        let executor = executor();
        run(&executor, "INSERT INTO t (name) VALUES ('a')").unwrap();
        let replies = run(&executor, "TRUNCATE t; TRUNCATE TABLE t").unwrap();
        assert_eq!(replies[0].rows_affected(), Some(1));
        assert_eq!(replies[1].rows_affected(), Some(0));
    }

    #[test]
    fn test_unknown_column_in_where() {
        let executor = executor();
        assert!(matches!(
            run(&executor, "DELETE FROM t WHERE nope = 1"),
            Err(EngineError::AttributeNotFound { .. })
        ));
    }
}
