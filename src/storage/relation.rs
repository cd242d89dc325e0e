/// Relations: a table schema bound to its rows
use crate::error::{EngineError, Result};
use crate::types::{Attribute, IndexDef, Literal, Table, Value};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One row. Its length always equals the attribute count of its table.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// Result of inserting one row
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// Value assigned to the autoincrement attribute, if any
    pub auto_id: Option<i64>,
    /// Value of the RETURNING attribute, if requested
    pub returned: Option<Value>,
}

/// Table and rows, guarded together by the relation lock
#[derive(Debug)]
pub struct RelationData {
    pub table: Table,
    pub rows: Vec<Tuple>,
    pub indexes: Vec<IndexDef>,
}

/// A table bound to its live rows.
///
/// The lock is taken once per statement and held until the statement
/// finishes: shared for SELECT, exclusive for every write.
#[derive(Debug)]
pub struct Relation {
    name: String,
    data: RwLock<RelationData>,
}

impl Relation {
    pub fn new(table: Table) -> Self {
        Self {
            name: table.name.clone(),
            data: RwLock::new(RelationData {
                table,
                rows: Vec::new(),
                indexes: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared access. Recursive so that a statement naming the same table
    /// twice cannot deadlock behind a queued writer.
    pub fn read(&self) -> RwLockReadGuard<'_, RelationData> {
        self.data.read_recursive()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RelationData> {
        self.data.write()
    }
}

impl RelationData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append one row built from the supplied columns and values.
    pub fn insert(
        &mut self,
        columns: &[String],
        values: &[Literal],
        returning: Option<&str>,
    ) -> Result<InsertOutcome> {
        for column in columns {
            self.table.require(column)?;
        }

        let mut outcome = InsertOutcome {
            auto_id: None,
            returned: None,
        };
        let mut tuple = Vec::with_capacity(self.table.attributes.len());

        for (position, attr) in self.table.attributes.iter().enumerate() {
            let supplied = columns
                .iter()
                .position(|c| c == &attr.name)
                .and_then(|i| values.get(i));

            let value = if attr.auto_increment {
                // Derived from the row count: ids freed by DELETE are reused
                let id = self.rows.len() as i64 + 1;
                outcome.auto_id = Some(id);
                Value::Integer(id)
            } else {
                match supplied {
                    Some(literal) => attr.coerce(literal)?,
                    None => attr.default_value()?,
                }
            };

            if attr.not_null && value.is_null() {
                return Err(EngineError::NotNullViolation(attr.name.clone()));
            }
            if attr.unique && !value.is_null() {
                let nocase = self.is_nocase(&attr.name);
                let taken = self
                    .rows
                    .iter()
                    .any(|row| row.get(position).map_or(false, |v| same_key(v, &value, nocase)));
                if taken {
                    return Err(self.unique_violation(attr, &value));
                }
            }
            if returning == Some(attr.name.as_str()) {
                outcome.returned = Some(value.clone());
            }
            tuple.push(value);
        }

        if let Some(column) = returning {
            self.table.require(column)?;
        }
        self.rows.push(Tuple::new(tuple));
        Ok(outcome)
    }

    /// Remove every row for which `matches` holds, keeping survivors in
    /// order. Nothing is removed if evaluation fails on any row.
    pub fn delete_where<F>(&mut self, mut matches: F) -> Result<u64>
    where
        F: FnMut(&Tuple) -> Result<bool>,
    {
        let mut kept = Vec::with_capacity(self.rows.len());
        let mut removed = 0u64;
        for row in &self.rows {
            if matches(row)? {
                removed += 1;
            } else {
                kept.push(row.clone());
            }
        }
        self.rows = kept;
        Ok(removed)
    }

    /// Assign `assignments` on every row for which `matches` holds.
    /// All rows are updated or none are.
    pub fn update_where<F>(&mut self, assignments: &[(String, Literal)], mut matches: F) -> Result<u64>
    where
        F: FnMut(&Tuple) -> Result<bool>,
    {
        let mut resolved = Vec::with_capacity(assignments.len());
        for (column, literal) in assignments {
            let position = self.table.require(column)?;
            let attr = &self.table.attributes[position];
            let value = attr.coerce(literal)?;
            if attr.not_null && value.is_null() {
                return Err(EngineError::NotNullViolation(attr.name.clone()));
            }
            resolved.push((position, value));
        }

        let mut matched = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            if matches(row)? {
                matched.push(index);
            }
        }

        let mut next = self.rows.clone();
        for &index in &matched {
            for (position, value) in &resolved {
                next[index].values[*position] = value.clone();
            }
        }

        for (position, value) in &resolved {
            let attr = &self.table.attributes[*position];
            if !attr.unique || value.is_null() {
                continue;
            }
            let nocase = self.is_nocase(&attr.name);
            for &index in &matched {
                let clash = next.iter().enumerate().any(|(other, row)| {
                    other != index && row.get(*position).map_or(false, |v| same_key(v, value, nocase))
                });
                if clash {
                    return Err(self.unique_violation(attr, value));
                }
            }
        }

        self.rows = next;
        Ok(matched.len() as u64)
    }

    /// Drop every row and return how many there were.
    pub fn truncate(&mut self) -> u64 {
        let count = self.rows.len() as u64;
        self.rows = Vec::new();
        count
    }

    /// Register index metadata. A unique index on one column makes that
    /// column unique; existing rows must already satisfy it.
    pub fn create_index(&mut self, index: IndexDef) -> Result<()> {
        if self.indexes.iter().any(|i| i.name == index.name) {
            return Err(EngineError::IndexExists(index.name));
        }
        for column in &index.columns {
            self.table.require(&column.name)?;
        }

        if index.unique && index.columns.len() == 1 {
            let column = &index.columns[0];
            let position = self.table.require(&column.name)?;
            for (i, row) in self.rows.iter().enumerate() {
                let Some(value) = row.get(position) else { continue };
                if value.is_null() {
                    continue;
                }
                let duplicate = self.rows[..i]
                    .iter()
                    .any(|other| other.get(position).map_or(false, |v| same_key(v, value, column.nocase)));
                if duplicate {
                    return Err(self.unique_violation(&self.table.attributes[position], value));
                }
            }
            self.table.attributes[position].unique = true;
        }

        self.indexes.push(index);
        Ok(())
    }

    /// Whether a unique check on `attribute` ignores case.
    fn is_nocase(&self, attribute: &str) -> bool {
        self.indexes.iter().any(|index| {
            index.unique
                && index.columns.len() == 1
                && index.columns[0].name == attribute
                && index.columns[0].nocase
        })
    }

    fn unique_violation(&self, attr: &Attribute, value: &Value) -> EngineError {
        EngineError::UniqueViolation {
            table: self.table.name.clone(),
            attribute: attr.name.clone(),
            value: value.to_string(),
        }
    }
}

/// Two stored values collide when their canonical strings match.
fn same_key(stored: &Value, candidate: &Value, nocase: bool) -> bool {
    if stored.is_null() {
        return false;
    }
    let (a, b) = (stored.to_string(), candidate.to_string());
    if nocase {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefaultValue, IndexColumn};

    fn users() -> Relation {
        let table = Table::new(
            "users",
            vec![
                Attribute::new("id", "int").auto_increment(),
                Attribute::new("email", "text").unique(),
                Attribute::new("age", "int")
                    .with_default(DefaultValue::Literal(Literal::number("18"))),
            ],
        )
        .unwrap();
        Relation::new(table)
    }

    fn insert(data: &mut RelationData, email: &str) -> Result<InsertOutcome> {
        data.insert(&["email".to_string()], &[Literal::string(email)], None)
    }

    #[test]
    fn test_insert_applies_autoincrement_and_default() {
        let relation = users();
        let mut data = relation.write();
        let first = insert(&mut data, "a@x").unwrap();
        let second = insert(&mut data, "b@x").unwrap();
        assert_eq!(first.auto_id, Some(1));
        assert_eq!(second.auto_id, Some(2));
        assert_eq!(data.rows[1].values[2], Value::Integer(18));
    }

    #[test]
    fn test_supplied_autoincrement_value_is_ignored() {
        let relation = users();
        let mut data = relation.write();
        data.insert(
            &["id".to_string(), "email".to_string()],
            &[Literal::number("99"), Literal::string("a@x")],
            Some("id"),
        )
        .unwrap();
        assert_eq!(data.rows[0].values[0], Value::Integer(1));
    }

    #[test]
    fn test_unique_violation_keeps_one_row() {
        let relation = users();
        let mut data = relation.write();
        insert(&mut data, "a@x").unwrap();
        let err = insert(&mut data, "a@x").unwrap_err();
        assert!(matches!(err, EngineError::UniqueViolation { ref attribute, .. } if attribute == "email"));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let relation = users();
        let mut data = relation.write();
        let err = data
            .insert(&["nope".to_string()], &[Literal::number("1")], None)
            .unwrap_err();
        assert!(matches!(err, EngineError::AttributeNotFound { .. }));
    }

    #[test]
    fn test_delete_preserves_order() {
        let relation = users();
        let mut data = relation.write();
        for email in ["a", "b", "c", "d"] {
            insert(&mut data, email).unwrap();
        }
        let removed = data
            .delete_where(|row| Ok(row.values[1] == Value::Text("b".into())))
            .unwrap();
        assert_eq!(removed, 1);
        let left: Vec<String> = data.rows.iter().map(|r| r.values[1].to_string()).collect();
        assert_eq!(left, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_update_checks_uniqueness_atomically() {
        let relation = users();
        let mut data = relation.write();
        insert(&mut data, "a").unwrap();
        insert(&mut data, "b").unwrap();

        let err = data
            .update_where(&[("email".to_string(), Literal::string("z"))], |_| Ok(true))
            .unwrap_err();
        assert!(matches!(err, EngineError::UniqueViolation { .. }));
        assert_eq!(data.rows[0].values[1], Value::Text("a".into()));

        let updated = data
            .update_where(&[("age".to_string(), Literal::number("30"))], |row| {
                Ok(row.values[1] == Value::Text("b".into()))
            })
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(data.rows[1].values[2], Value::Integer(30));
    }

    #[test]
    fn test_truncate_returns_prior_count() {
        let relation = users();
        let mut data = relation.write();
        assert_eq!(data.truncate(), 0);
        insert(&mut data, "a").unwrap();
        assert_eq!(data.truncate(), 1);
        assert!(data.is_empty());
    }

    #[test]
    fn test_unique_nocase_index() {
        let table = Table::new("t", vec![Attribute::new("name", "text")]).unwrap();
        let relation = Relation::new(table);
        let mut data = relation.write();
        data.create_index(IndexDef {
            name: "idx_name".into(),
            columns: vec![IndexColumn {
                name: "name".into(),
                nocase: true,
            }],
            unique: true,
        })
        .unwrap();

        data.insert(&["name".to_string()], &[Literal::string("Bob")], None)
            .unwrap();
        let err = data
            .insert(&["name".to_string()], &[Literal::string("BOB")], None)
            .unwrap_err();
        assert!(matches!(err, EngineError::UniqueViolation { .. }));

        let err = data
            .create_index(IndexDef {
                name: "idx_name".into(),
                columns: vec![],
                unique: false,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::IndexExists(_)));
    }
}
