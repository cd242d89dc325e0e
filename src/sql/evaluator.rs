/// Predicate evaluator - operands, operators and WHERE conditions
use super::ast::{ColumnRef, CompareOp, Condition};
use super::join::VirtualRow;
use crate::error::{EngineError, Result};
use crate::types::timestamp::{now_formatted, parse_date};
use crate::types::{Literal, Value};
use std::cmp::Ordering;

/// What an operand carries once bound
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    /// Only the raw lexeme is known
    None,
    Scalar(Value),
    List(Vec<String>),
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub value: Materialized,
    pub lexeme: String,
}

impl Operand {
    /// A value read from a virtual row.
    pub fn scalar(value: Value) -> Self {
        Self {
            lexeme: value.to_string(),
            value: Materialized::Scalar(value),
        }
    }

    /// A literal from the statement text. Generators are expanded here so
    /// that `col < NOW()` compares against the current time.
    pub fn literal(literal: &Literal) -> Self {
        let lexeme = if literal.is_generator() {
            now_formatted()
        } else {
            literal.lexeme.clone()
        };
        Self {
            value: Materialized::None,
            lexeme,
        }
    }

    pub fn list(literals: &[Literal]) -> Self {
        let items: Vec<String> = literals.iter().map(|l| Self::literal(l).lexeme).collect();
        Self {
            lexeme: items.join(","),
            value: Materialized::List(items),
        }
    }

    /// Placeholder right side of unary operators
    pub fn none() -> Self {
        Self {
            value: Materialized::None,
            lexeme: String::new(),
        }
    }

    /// Canonical string of the operand
    fn text(&self) -> &str {
        &self.lexeme
    }

    fn is_null(&self) -> bool {
        matches!(&self.value, Materialized::Scalar(Value::Null))
    }
}

/// Pure binary boolean function over two operands
pub type Operator = fn(&Operand, &Operand) -> bool;

/// `=`: the left canonical string against the right raw lexeme.
/// A NULL left side equals no lexeme, not even `NULL`.
pub fn equality(left: &Operand, right: &Operand) -> bool {
    !left.is_null() && left.text() == right.text()
}

pub fn distinctness(left: &Operand, right: &Operand) -> bool {
    !equality(left, right)
}

/// Numeric comparison, or chronological when the left side is not a number.
fn ordering(left: &Operand, right: &Operand) -> Option<Ordering> {
    if let Ok(l) = left.text().trim().parse::<f64>() {
        let r = right.text().trim().parse::<f64>().ok()?;
        return l.partial_cmp(&r);
    }
    let l = parse_date(left.text())?;
    let r = parse_date(right.text())?;
    Some(l.cmp(&r))
}

pub fn less_than(left: &Operand, right: &Operand) -> bool {
    ordering(left, right) == Some(Ordering::Less)
}

pub fn greater_than(left: &Operand, right: &Operand) -> bool {
    ordering(left, right) == Some(Ordering::Greater)
}

pub fn less_or_equal(left: &Operand, right: &Operand) -> bool {
    less_than(left, right) || equality(left, right)
}

pub fn greater_or_equal(left: &Operand, right: &Operand) -> bool {
    greater_than(left, right) || equality(left, right)
}

pub fn in_list(left: &Operand, right: &Operand) -> bool {
    if left.is_null() {
        return false;
    }
    match &right.value {
        Materialized::List(items) => items.iter().any(|item| item == left.text()),
        _ => false,
    }
}

pub fn not_in_list(left: &Operand, right: &Operand) -> bool {
    !in_list(left, right)
}

pub fn is_null(left: &Operand, _right: &Operand) -> bool {
    left.is_null()
}

pub fn is_not_null(left: &Operand, _right: &Operand) -> bool {
    !left.is_null()
}

pub fn always_true(_left: &Operand, _right: &Operand) -> bool {
    true
}

impl CompareOp {
    pub fn operator(&self) -> Operator {
        match self {
            CompareOp::Eq => equality,
            CompareOp::Ne => distinctness,
            CompareOp::Lt => less_than,
            CompareOp::Gt => greater_than,
            CompareOp::Le => less_or_equal,
            CompareOp::Ge => greater_or_equal,
        }
    }
}

/// A WHERE comparison bound to its operator and operands
#[derive(Clone)]
pub struct Predicate {
    /// Virtual-row key of the left operand
    pub left: String,
    pub operator: Operator,
    pub right: Operand,
    pub always_true: bool,
}

impl Predicate {
    pub fn always() -> Self {
        Self {
            left: String::new(),
            operator: always_true,
            right: Operand::none(),
            always_true: true,
        }
    }

    pub fn eval(&self, row: &VirtualRow) -> Result<bool> {
        if self.always_true {
            return Ok(true);
        }
        let value = row
            .get(&self.left)
            .ok_or_else(|| EngineError::AttributeNotInRow(self.left.clone()))?;
        let left = Operand::scalar(value.clone());
        Ok((self.operator)(&left, &self.right))
    }
}

/// Evaluate a conjunction of predicates.
pub fn eval_all(predicates: &[Predicate], row: &VirtualRow) -> Result<bool> {
    for predicate in predicates {
        if !predicate.eval(row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Tables visible to a statement and their attribute names, in FROM/JOIN
/// order. Resolves column references to virtual-row keys.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    tables: Vec<(String, Vec<String>)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: &str, attributes: Vec<String>) {
        if !self.tables.iter().any(|(name, _)| name == table) {
            self.tables.push((table.to_string(), attributes));
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables.iter().map(|(n, a)| (n.as_str(), a.as_slice()))
    }

    /// `table.attribute` key of a column reference.
    pub fn resolve(&self, column: &ColumnRef) -> Result<String> {
        if let Some(table) = &column.table {
            let (_, attributes) = self
                .tables
                .iter()
                .find(|(name, _)| name == table)
                .ok_or_else(|| EngineError::TableNotFound(table.clone()))?;
            if !attributes.iter().any(|a| a == &column.name) {
                return Err(EngineError::attribute_not_found(table, &column.name));
            }
            return Ok(key(table, &column.name));
        }

        let mut owners = self
            .tables
            .iter()
            .filter(|(_, attributes)| attributes.iter().any(|a| a == &column.name));
        match (owners.next(), owners.next()) {
            (Some((table, _)), None) => Ok(key(table, &column.name)),
            (Some(_), Some(_)) => Err(EngineError::AmbiguousAttribute(column.name.clone())),
            (None, _) => {
                let tables: Vec<&str> = self.tables.iter().map(|(n, _)| n.as_str()).collect();
                Err(EngineError::attribute_not_found(&tables.join(", "), &column.name))
            }
        }
    }
}

/// Virtual-row key of an attribute
pub fn key(table: &str, attribute: &str) -> String {
    format!("{}.{}", table, attribute)
}

/// Bind WHERE conditions to predicates over `scope`.
pub fn build_predicates(conditions: &[Condition], scope: &Scope) -> Result<Vec<Predicate>> {
    conditions
        .iter()
        .map(|condition| match condition {
            Condition::True => Ok(Predicate::always()),
            Condition::Compare { column, op, value } => Ok(Predicate {
                left: scope.resolve(column)?,
                operator: op.operator(),
                right: Operand::literal(value),
                always_true: false,
            }),
            Condition::In {
                column,
                values,
                negated,
            } => Ok(Predicate {
                left: scope.resolve(column)?,
                operator: if *negated { not_in_list } else { in_list },
                right: Operand::list(values),
                always_true: false,
            }),
            Condition::IsNull { column, negated } => Ok(Predicate {
                left: scope.resolve(column)?,
                operator: if *negated { is_not_null } else { is_null },
                right: Operand::none(),
                always_true: false,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LiteralKind;

    fn scalar(value: Value) -> Operand {
        Operand::scalar(value)
    }

    #[test]
    fn test_equality_uses_raw_lexeme() {
        assert!(equality(&scalar(Value::Integer(1)), &Operand::literal(&Literal::number("1"))));
        // 1.0 is numerically equal but not lexically
        assert!(!equality(&scalar(Value::Integer(1)), &Operand::literal(&Literal::number("1.0"))));
        assert!(distinctness(&scalar(Value::Text("x".into())), &Operand::literal(&Literal::string("y"))));
    }

    #[test]
    fn test_ordering_numeric_then_date() {
        let ten = scalar(Value::Integer(10));
        assert!(greater_than(&ten, &Operand::literal(&Literal::number("9"))));
        assert!(less_or_equal(&ten, &Operand::literal(&Literal::number("10"))));
        assert!(!less_than(&ten, &Operand::literal(&Literal::string("abc"))));

        let day = scalar(Value::Text("2021-03-04".into()));
        assert!(less_than(&day, &Operand::literal(&Literal::string("2021-03-05 00:00:00"))));
        assert!(greater_or_equal(&day, &Operand::literal(&Literal::string("2021-Mar-03"))));
        assert!(greater_or_equal(&day, &Operand::literal(&Literal::string("2021-03-04"))));
        assert!(!less_than(&scalar(Value::Text("hello".into())), &Operand::literal(&Literal::string("world"))));
    }

    #[test]
    fn test_list_and_null_operators() {
        let list = Operand::list(&[Literal::number("1"), Literal::number("3")]);
        assert!(in_list(&scalar(Value::Integer(3)), &list));
        assert!(not_in_list(&scalar(Value::Integer(2)), &list));
        assert!(is_null(&scalar(Value::Null), &Operand::none()));
        assert!(is_not_null(&scalar(Value::Integer(0)), &Operand::none()));
    }

    #[test]
    fn test_null_matches_no_lexeme() {
        let null = scalar(Value::Null);
        let word = scalar(Value::Text("null".into()));
        let null_literal = Operand::literal(&Literal::new(LiteralKind::Null, "null"));

        assert!(!equality(&null, &null_literal));
        assert!(distinctness(&null, &null_literal));
        assert!(!equality(&null, &Operand::literal(&Literal::string("null"))));
        assert!(equality(&word, &Operand::literal(&Literal::string("null"))));

        let list = Operand::list(&[Literal::new(LiteralKind::Null, "null"), Literal::number("1")]);
        assert!(!in_list(&null, &list));
        assert!(not_in_list(&null, &list));
        assert!(!less_or_equal(&null, &null_literal));
        assert!(!greater_or_equal(&null, &null_literal));
    }

    #[test]
    fn test_predicate_missing_key() {
        let mut row = VirtualRow::default();
        row.insert("t.a".into(), Value::Integer(1));
        let predicate = Predicate {
            left: "t.b".into(),
            operator: equality,
            right: Operand::literal(&Literal::number("1")),
            always_true: false,
        };
        assert!(matches!(predicate.eval(&row), Err(EngineError::AttributeNotInRow(_))));
        assert!(Predicate::always().eval(&row).unwrap());
    }

    #[test]
    fn test_scope_resolution() {
        let mut scope = Scope::new();
        scope.push("a", vec!["id".into(), "name".into()]);
        scope.push("b", vec!["id".into(), "val".into()]);

        assert_eq!(scope.resolve(&ColumnRef::new("val")).unwrap(), "b.val");
        assert_eq!(scope.resolve(&ColumnRef::qualified("a", "id")).unwrap(), "a.id");
        assert!(matches!(
            scope.resolve(&ColumnRef::new("id")),
            Err(EngineError::AmbiguousAttribute(_))
        ));
        assert!(matches!(
            scope.resolve(&ColumnRef::new("nope")),
            Err(EngineError::AttributeNotFound { .. })
        ));
        assert!(matches!(
            scope.resolve(&ColumnRef::qualified("c", "id")),
            Err(EngineError::TableNotFound(_))
        ));
    }
}
