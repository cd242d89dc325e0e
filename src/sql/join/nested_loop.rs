/// Nested Loop Join
///
/// Algorithm:
/// 1. Scan the base relation, one virtual row per tuple
/// 2. For each join level, scan its relation and merge every tuple whose
///    ON equality holds, then descend to the next level
/// 3. At the last level hand the virtual row to the caller
///
/// Time complexity: O(n * m * ...) over the joined relations
use super::VirtualRow;
use crate::error::{EngineError, Result};
use crate::sql::ast::Join;
use crate::sql::evaluator::Scope;
use crate::storage::{RelationData, Tuple};
use crate::types::Value;

/// ON equality oriented towards the relation being scanned
#[derive(Debug, Clone)]
pub struct OnCondition {
    /// Position in the scanned relation's tuples
    pub candidate_position: usize,
    /// Key already present in the virtual row
    pub row_key: String,
}

impl OnCondition {
    /// Orient `join` so that the operand naming `join.table` reads from
    /// the candidate tuple.
    pub fn orient(join: &Join, data: &RelationData, scope: &Scope) -> Result<Self> {
        let left = scope.resolve(&join.left)?;
        let right = scope.resolve(&join.right)?;
        let prefix = format!("{}.", join.table);

        let (candidate, other) = if left.starts_with(&prefix) {
            (left, right)
        } else if right.starts_with(&prefix) {
            (right, left)
        } else {
            return Err(EngineError::Malformed(format!(
                "join condition {} = {} does not reference table {}",
                join.left, join.right, join.table
            )));
        };

        Ok(Self {
            candidate_position: data.table.require(&candidate[prefix.len()..])?,
            row_key: other,
        })
    }

    fn matches(&self, row: &VirtualRow, candidate: &Tuple) -> Result<bool> {
        let bound = row
            .get(&self.row_key)
            .ok_or_else(|| EngineError::AttributeNotInRow(self.row_key.clone()))?;
        Ok(match candidate.get(self.candidate_position) {
            Some(Value::Null) | None => false,
            Some(value) => !bound.is_null() && value.to_string() == bound.to_string(),
        })
    }
}

/// One joined relation. Without an ON condition every tuple matches.
pub struct JoinLevel<'a> {
    pub table: &'a str,
    pub data: &'a RelationData,
    pub on: Option<OnCondition>,
}

pub struct NestedLoopJoin<'a> {
    base_table: &'a str,
    base: &'a RelationData,
    levels: Vec<JoinLevel<'a>>,
}

impl<'a> NestedLoopJoin<'a> {
    pub fn new(base_table: &'a str, base: &'a RelationData) -> Self {
        Self {
            base_table,
            base,
            levels: Vec::new(),
        }
    }

    pub fn add_level(&mut self, level: JoinLevel<'a>) {
        self.levels.push(level);
    }

    /// Produce every joined virtual row, in base order then join order.
    pub fn run<F>(&self, mut emit: F) -> Result<()>
    where
        F: FnMut(&VirtualRow) -> Result<()>,
    {
        let width: usize = self.base.table.attributes.len()
            + self
                .levels
                .iter()
                .map(|l| l.data.table.attributes.len())
                .sum::<usize>();

        for tuple in &self.base.rows {
            let mut row = VirtualRow::with_capacity(width);
            merge(&mut row, self.base_table, self.base, tuple);
            self.descend(0, &mut row, &mut emit)?;
        }
        Ok(())
    }

    fn descend<F>(&self, depth: usize, row: &mut VirtualRow, emit: &mut F) -> Result<()>
    where
        F: FnMut(&VirtualRow) -> Result<()>,
    {
        let Some(level) = self.levels.get(depth) else {
            return emit(row);
        };
        for candidate in &level.data.rows {
            let matched = match &level.on {
                Some(on) => on.matches(row, candidate)?,
                None => true,
            };
            if matched {
                // Keys of this level are overwritten by the next candidate
                merge(row, level.table, level.data, candidate);
                self.descend(depth + 1, row, emit)?;
            }
        }
        Ok(())
    }
}

/// Key every value of `tuple` as `table.attribute` in `row`.
pub fn merge(row: &mut VirtualRow, table: &str, data: &RelationData, tuple: &Tuple) {
    for (attr, value) in data.table.attributes.iter().zip(&tuple.values) {
        row.insert(format!("{}.{}", table, attr.name), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::ColumnRef;
    use crate::storage::Relation;
    use crate::types::{Attribute, Literal, Table};

    fn relation(name: &str, columns: &[&str], rows: &[&[&str]]) -> Relation {
        let attributes = columns.iter().map(|c| Attribute::new(*c, "text")).collect();
        let relation = Relation::new(Table::new(name, attributes).unwrap());
        {
            let mut data = relation.write();
            let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            for row in rows {
                let values: Vec<Literal> = row.iter().map(|v| Literal::string(*v)).collect();
                data.insert(&names, &values, None).unwrap();
            }
        }
        relation
    }

    #[test]
    fn test_join_pairs_matching_rows() {
        let a = relation("a", &["id"], &[&["1"], &["2"]]);
        let b = relation("b", &["a_id", "val"], &[&["1", "x"], &["2", "y"], &["2", "z"]]);
        let (a_data, b_data) = (a.read(), b.read());

        let mut scope = Scope::new();
        scope.push("a", vec!["id".into()]);
        scope.push("b", vec!["a_id".into(), "val".into()]);

        // Written backwards on purpose: b is the scanned side either way
        let join = Join {
            table: "b".into(),
            left: ColumnRef::qualified("b", "a_id"),
            right: ColumnRef::qualified("a", "id"),
        };
        let on = OnCondition::orient(&join, &b_data, &scope).unwrap();
        assert_eq!(on.row_key, "a.id");

        let mut nested = NestedLoopJoin::new("a", &a_data);
        nested.add_level(JoinLevel {
            table: "b",
            data: &b_data,
            on: Some(on),
        });

        let mut pairs = Vec::new();
        nested
            .run(|row| {
                pairs.push((row["a.id"].to_string(), row["b.a_id"].to_string(), row["b.val"].to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(pairs.len(), 3);
        for (id, a_id, _) in &pairs {
            assert_eq!(id, a_id);
        }
        assert_eq!(pairs[2].2, "z");
    }

    #[test]
    fn test_cross_join_without_condition() {
        let a = relation("a", &["x"], &[&["1"], &["2"]]);
        let b = relation("b", &["y"], &[&["3"], &["4"], &["5"]]);
        let (a_data, b_data) = (a.read(), b.read());

        let mut nested = NestedLoopJoin::new("a", &a_data);
        nested.add_level(JoinLevel {
            table: "b",
            data: &b_data,
            on: None,
        });
        let mut count = 0;
        nested.run(|_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 6);
    }
}
