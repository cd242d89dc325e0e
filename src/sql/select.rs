/// SELECT handler: locks, joins, filters and projects
use super::ast::{Clause, Distinct, SelectStmt, Statement};
use super::evaluator::{build_predicates, eval_all, Scope};
use super::executor::{misrouted, ClauseHandler, QueryExecutor};
use super::functor::build_functor;
use super::join::{JoinLevel, NestedLoopJoin, OnCondition};
use crate::error::{EngineError, Result};
use crate::protocol::{decorators, RowSink};
use crate::storage::{Relation, RelationData};
use parking_lot::RwLockReadGuard;
use std::sync::Arc;

pub struct SelectHandler;

impl ClauseHandler for SelectHandler {
    fn clause(&self) -> Clause {
        Clause::Select
    }

    fn execute(
        &self,
        executor: &QueryExecutor,
        statement: &Statement,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Statement::Select(select) = statement else {
            return Err(misrouted(self.clause(), statement));
        };
        run_select(executor, select, sink)
    }
}

/// Tables named by FROM then JOIN, each once
fn table_names(select: &SelectStmt) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    let all = select
        .from
        .iter()
        .chain(select.joins.iter().map(|j| &j.table));
    for name in all {
        if !names.contains(&name.as_str()) {
            names.push(name);
        }
    }
    names
}

fn data_for<'g>(
    names: &[&str],
    guards: &'g [RwLockReadGuard<'_, RelationData>],
    name: &str,
) -> &'g RelationData {
    let index = names.iter().position(|n| *n == name).unwrap_or(0);
    &guards[index]
}

fn run_select(executor: &QueryExecutor, select: &SelectStmt, sink: &mut dyn RowSink) -> Result<()> {
    let names = table_names(select);
    let base_name = *names
        .first()
        .ok_or_else(|| EngineError::Malformed("SELECT without FROM".to_string()))?;

    // Resolve through the catalog first, then lock each relation once for
    // the whole statement.
    let relations: Vec<Arc<Relation>> = names
        .iter()
        .map(|name| executor.catalog().get(name))
        .collect::<Result<_>>()?;
    let guards: Vec<RwLockReadGuard<'_, RelationData>> =
        relations.iter().map(|r| r.read()).collect();
    let data_of = |name: &str| data_for(&names, &guards, name);

    let mut scope = Scope::new();
    for (name, guard) in names.iter().zip(&guards) {
        scope.push(name, guard.table.attribute_names().map(String::from).collect());
    }

    let predicates = build_predicates(&select.where_clause, &scope)?;

    let mut nested = NestedLoopJoin::new(base_name, data_of(base_name));
    let mut crossed = vec![base_name];
    for table in select.from.iter().skip(1) {
        if crossed.contains(&table.as_str()) {
            continue;
        }
        crossed.push(table);
        nested.add_level(JoinLevel {
            table,
            data: data_of(table.as_str()),
            on: None,
        });
    }
    for join in &select.joins {
        let data = data_of(join.table.as_str());
        nested.add_level(JoinLevel {
            table: &join.table,
            data,
            on: Some(OnCondition::orient(join, data, &scope)?),
        });
    }

    let mut functor = build_functor(&select.projections, &select.order_by, &scope)?;

    // Rows flow distinct -> offset -> limit -> connection
    let mut chain: Box<dyn RowSink + '_> = Box::new(sink);
    if let Some(limit) = select.limit {
        chain = Box::new(decorators::Limit::new(chain, limit));
    }
    if let Some(offset) = select.offset {
        chain = Box::new(decorators::Offset::new(chain, offset));
    }
    match &select.distinct {
        Some(Distinct::All) => chain = Box::new(decorators::Distinct::new(chain, None)),
        Some(Distinct::On(keys)) => {
            chain = Box::new(decorators::Distinct::new(chain, Some(keys.len())))
        }
        None => {}
    }

    functor.init(&mut chain)?;
    nested.run(|row| {
        if eval_all(&predicates, row)? {
            functor.feed(row, &mut chain)?;
        }
        Ok(())
    })?;
    functor.done(&mut chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::protocol::{Reply, ReplyCollector};

    fn executor(setup: &str) -> QueryExecutor {
        let executor = QueryExecutor::new(Arc::new(Catalog::new()));
        let mut collector = ReplyCollector::new();
        executor.execute_sql(setup, &mut collector).unwrap();
        executor
    }

    fn select(executor: &QueryExecutor, sql: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let mut collector = ReplyCollector::new();
        executor.execute_sql(sql, &mut collector)?;
        match collector.into_replies().pop() {
            Some(Reply::Rows { header, rows }) => Ok((header, rows)),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    fn column(rows: &[Vec<String>], index: usize) -> Vec<&str> {
        rows.iter().map(|r| r[index].as_str()).collect()
    }

    #[test]
    fn test_select_star_in_insertion_order() {
        let executor = executor(
            "CREATE TABLE t (id INT AUTOINCREMENT, name TEXT); \
             INSERT INTO t (name) VALUES ('a'); INSERT INTO t (name) VALUES ('b')",
        );
        let (header, rows) = select(&executor, "SELECT * FROM t").unwrap();
        assert_eq!(header, vec!["id", "name"]);
        assert_eq!(rows, vec![vec!["1", "a"], vec!["2", "b"]]);
    }

    #[test]
    fn test_join_where_and_ambiguity() {
        let executor = executor(
            "CREATE TABLE a (id INT); CREATE TABLE b (id INT, a_id INT, val TEXT); \
             INSERT INTO a (id) VALUES (1), (2); \
             INSERT INTO b (id, a_id, val) VALUES (10, 1, 'x'), (11, 2, 'y'), (12, 2, 'z')",
        );
        let (_, rows) = select(&executor, "SELECT a.id, val FROM a JOIN b ON a.id = b.a_id").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(column(&rows, 1), vec!["x", "y", "z"]);

        let (_, rows) = select(
            &executor,
            "SELECT val FROM a JOIN b ON b.a_id = a.id WHERE a.id = 2 AND val <> 'y'",
        )
        .unwrap();
        assert_eq!(rows, vec![vec!["z"]]);

        assert!(matches!(
            select(&executor, "SELECT id FROM a JOIN b ON a.id = b.a_id"),
            Err(EngineError::AmbiguousAttribute(_))
        ));
    }

    #[test]
    fn test_distinct_offset_limit() {
        let executor = executor("CREATE TABLE t (n INT)");
        let mut collector = ReplyCollector::new();
        for i in 0..10 {
            executor
                .execute_sql(&format!("INSERT INTO t (n) VALUES ({0}), ({0})", i), &mut collector)
                .unwrap();
        }
        let (_, rows) = select(&executor, "SELECT DISTINCT n FROM t LIMIT 3 OFFSET 2").unwrap();
        assert_eq!(column(&rows, 0), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_distinct_on_and_order_by() {
        let executor = executor(
            "CREATE TABLE p (name TEXT, age INT); \
             INSERT INTO p (name, age) VALUES ('bob', 40), ('amy', 30), ('bob', 20)",
        );
        let (header, rows) =
            select(&executor, "SELECT DISTINCT ON (name) name, age FROM p ORDER BY age").unwrap();
        assert_eq!(header, vec!["name", "age"]);
        assert_eq!(rows, vec![vec!["bob", "20"], vec!["amy", "30"]]);
    }

    #[test]
    fn test_count_and_filters() {
        let executor = executor(
            "CREATE TABLE p (name TEXT, age INT); \
             INSERT INTO p (name, age) VALUES ('a', 1), ('b', NULL), ('c', 3)",
        );
        let (header, rows) = select(&executor, "SELECT COUNT(*) FROM p").unwrap();
        assert_eq!(header, vec!["COUNT(*)"]);
        assert_eq!(rows, vec![vec!["3"]]);

        let (_, rows) = select(&executor, "SELECT COUNT(age) FROM p").unwrap();
        assert_eq!(rows, vec![vec!["2"]]);

        let (_, rows) = select(&executor, "SELECT name FROM p WHERE age IS NULL").unwrap();
        assert_eq!(rows, vec![vec!["b"]]);

        let (_, rows) = select(&executor, "SELECT name FROM p WHERE name NOT IN ('a', 'c')").unwrap();
        assert_eq!(rows, vec![vec!["b"]]);

        let (_, rows) = select(&executor, "SELECT name FROM p WHERE age >= 1 ORDER BY name DESC").unwrap();
        assert_eq!(column(&rows, 0), vec!["c", "a"]);
    }

    #[test]
    fn test_unknown_table() {
        let executor = executor("CREATE TABLE t (n INT)");
        assert!(matches!(
            select(&executor, "SELECT * FROM t JOIN missing ON t.n = missing.n"),
            Err(EngineError::TableNotFound(_))
        ));
    }
}
