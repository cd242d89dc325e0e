/// Abstract Syntax Tree for SQL statements
use crate::types::Literal;
use std::fmt;

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Truncate(TruncateStmt),
    DropTable(DropTableStmt),
    /// GRANT is accepted and ignored
    Grant,
}

impl Statement {
    /// Clause whose handler executes this statement. Guarded CREATE and
    /// DROP go through the `If` handler.
    pub fn clause(&self) -> Clause {
        match self {
            Statement::CreateTable(s) if s.if_not_exists => Clause::If,
            Statement::CreateIndex(s) if s.if_not_exists => Clause::If,
            Statement::DropTable(s) if s.if_exists => Clause::If,
            Statement::CreateTable(_) | Statement::CreateIndex(_) => Clause::Create,
            Statement::Insert(_) => Clause::Insert,
            Statement::Select(_) => Clause::Select,
            Statement::Update(_) => Clause::Update,
            Statement::Delete(_) => Clause::Delete,
            Statement::Truncate(_) => Clause::Truncate,
            Statement::DropTable(_) => Clause::Drop,
            Statement::Grant => Clause::Grant,
        }
    }

    /// Clause of the statement once its guard has been evaluated.
    pub fn unguarded_clause(&self) -> Clause {
        match self {
            Statement::CreateTable(_) | Statement::CreateIndex(_) => Clause::Create,
            Statement::DropTable(_) => Clause::Drop,
            other => other.clause(),
        }
    }
}

/// Leading clause of a statement, used to pick its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Create,
    Select,
    Insert,
    Delete,
    Update,
    Truncate,
    Drop,
    Grant,
    If,
}

impl Clause {
    pub const ALL: [Clause; 9] = [
        Clause::Create,
        Clause::Select,
        Clause::Insert,
        Clause::Delete,
        Clause::Update,
        Clause::Truncate,
        Clause::Drop,
        Clause::Grant,
        Clause::If,
    ];
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Clause::Create => "CREATE",
            Clause::Select => "SELECT",
            Clause::Insert => "INSERT",
            Clause::Delete => "DELETE",
            Clause::Update => "UPDATE",
            Clause::Truncate => "TRUNCATE",
            Clause::Drop => "DROP",
            Clause::Grant => "GRANT",
            Clause::If => "IF",
        };
        f.write_str(keyword)
    }
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub table: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    /// Table-level `PRIMARY KEY (col, ...)`
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub with_time_zone: bool,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    Unique,
    NotNull,
    PrimaryKey,
    AutoIncrement,
    Default(Literal),
}

/// CREATE [UNIQUE] INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub if_not_exists: bool,
    pub columns: Vec<IndexedColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedColumn {
    pub name: String,
    /// COLLATE NOCASE
    pub nocase: bool,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    /// One entry per VALUES tuple
    pub rows: Vec<Vec<Literal>>,
    pub returning: Option<String>,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub distinct: Option<Distinct>,
    pub projections: Vec<Projection>,
    pub from: Vec<String>,
    pub joins: Vec<Join>,
    /// Never empty: a missing WHERE becomes `[Condition::True]`
    pub where_clause: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub for_update: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    All,
    /// DISTINCT ON (k columns); the columns are also projected first
    On(Vec<ColumnRef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star,
    Column(ColumnRef),
    Count(CountArg),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountArg {
    Star,
    Column(ColumnRef),
}

/// `[table.]column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// `JOIN table ON left = right`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `WHERE 1`, `WHERE 1 = 1` or no WHERE at all
    True,
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Literal,
    },
    In {
        column: ColumnRef,
        values: Vec<Literal>,
        negated: bool,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub assignments: Vec<(String, Literal)>,
    pub where_clause: Vec<Condition>,
}

/// DELETE statement. An empty WHERE list deletes every row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TruncateStmt {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub table: String,
    pub if_exists: bool,
}
