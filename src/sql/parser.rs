/// SQL Parser - converts tokens into AST
use super::ast::*;
use super::token::{Token, TokenKind};
use crate::error::{EngineError, Result};
use crate::types::{Literal, LiteralKind};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// `tokens` must already be stripped of whitespace.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, position: 0 }
    }

    /// Parse every statement of the input. Statements are separated by `;`.
    pub fn parse_all(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.match_token(TokenKind::Semicolon) {}
            if self.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.is_at_end() && !self.is(TokenKind::Semicolon) {
                return Err(self.error("expected ; or end of statement"));
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek_kind() {
            Some(TokenKind::Create) => self.parse_create(),
            Some(TokenKind::Select) => Ok(Statement::Select(self.parse_select()?)),
            Some(TokenKind::Insert) => Ok(Statement::Insert(self.parse_insert()?)),
            Some(TokenKind::Update) => Ok(Statement::Update(self.parse_update()?)),
            Some(TokenKind::Delete) => Ok(Statement::Delete(self.parse_delete()?)),
            Some(TokenKind::Truncate) => Ok(Statement::Truncate(self.parse_truncate()?)),
            Some(TokenKind::Drop) => Ok(Statement::DropTable(self.parse_drop()?)),
            Some(TokenKind::Grant) => self.parse_grant(),
            _ => Err(self.error(
                "expected CREATE, SELECT, INSERT, UPDATE, DELETE, TRUNCATE, DROP or GRANT",
            )),
        }
    }

    // ---- CREATE ----

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Create)?;
        match self.peek_kind() {
            Some(TokenKind::Table) => Ok(Statement::CreateTable(self.parse_create_table()?)),
            Some(TokenKind::Unique) | Some(TokenKind::Index) => {
                Ok(Statement::CreateIndex(self.parse_create_index()?))
            }
            _ => Err(self.error("expected TABLE or INDEX after CREATE")),
        }
    }

    fn parse_if_not_exists(&mut self) -> Result<bool> {
        if !self.match_token(TokenKind::If) {
            return Ok(false);
        }
        self.expect(TokenKind::Not)?;
        self.expect(TokenKind::Exists)?;
        Ok(true)
    }

    fn parse_create_table(&mut self) -> Result<CreateTableStmt> {
        self.expect(TokenKind::Table)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let table = self.parse_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            if self.match_token(TokenKind::Primary) {
                self.expect(TokenKind::Key)?;
                self.expect(TokenKind::LParen)?;
                primary_key.extend(self.parse_identifier_list()?);
                self.expect(TokenKind::RParen)?;
            } else {
                columns.push(self.parse_column_def()?);
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        if columns.is_empty() {
            return Err(self.error("table needs at least one column"));
        }
        Ok(CreateTableStmt {
            table,
            if_not_exists,
            columns,
            primary_key,
        })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.parse_identifier()?;
        let type_name = self.parse_type_name()?;
        let mut with_time_zone = false;
        let mut constraints = Vec::new();

        loop {
            match self.peek_kind() {
                Some(TokenKind::Unique) => {
                    self.advance();
                    constraints.push(ColumnConstraint::Unique);
                }
                Some(TokenKind::Not) => {
                    self.advance();
                    self.expect(TokenKind::Null)?;
                    constraints.push(ColumnConstraint::NotNull);
                }
                Some(TokenKind::Null) => {
                    self.advance();
                }
                Some(TokenKind::Primary) => {
                    self.advance();
                    self.expect(TokenKind::Key)?;
                    constraints.push(ColumnConstraint::PrimaryKey);
                }
                Some(TokenKind::AutoIncrement) => {
                    self.advance();
                    constraints.push(ColumnConstraint::AutoIncrement);
                }
                Some(TokenKind::Default) => {
                    self.advance();
                    constraints.push(ColumnConstraint::Default(self.parse_default_literal()?));
                }
                Some(TokenKind::With) => {
                    if !type_name.eq_ignore_ascii_case("timestamp") {
                        return Err(self.error("WITH TIME ZONE only applies to timestamp"));
                    }
                    self.advance();
                    self.expect(TokenKind::Time)?;
                    self.expect(TokenKind::Zone)?;
                    with_time_zone = true;
                }
                Some(TokenKind::Comma) | Some(TokenKind::RParen) => break,
                _ => return Err(self.error("unexpected column constraint")),
            }
        }

        Ok(ColumnDef {
            name,
            type_name,
            with_time_zone,
            constraints,
        })
    }

    /// Type name with an optional `(n)` or `(n, m)` size that is ignored.
    fn parse_type_name(&mut self) -> Result<String> {
        let type_name = self.parse_identifier()?;
        if self.match_token(TokenKind::LParen) {
            self.expect(TokenKind::Number)?;
            if self.match_token(TokenKind::Comma) {
                self.expect(TokenKind::Number)?;
            }
            self.expect(TokenKind::RParen)?;
        }
        Ok(type_name)
    }

    fn parse_default_literal(&mut self) -> Result<Literal> {
        let literal = match self.peek_kind() {
            Some(TokenKind::String) => Literal::new(LiteralKind::String, self.lexeme()),
            Some(TokenKind::Number) => Literal::new(LiteralKind::Number, self.lexeme()),
            Some(TokenKind::Date) => Literal::new(LiteralKind::Date, self.lexeme()),
            Some(TokenKind::True) | Some(TokenKind::False) => {
                Literal::new(LiteralKind::Bool, self.lexeme().to_lowercase())
            }
            Some(TokenKind::Null) => Literal::new(LiteralKind::Null, "null"),
            Some(TokenKind::Now) => Literal::new(LiteralKind::Now, self.lexeme()),
            Some(TokenKind::LocalTimestamp) => {
                Literal::new(LiteralKind::LocalTimestamp, self.lexeme())
            }
            _ => return Err(self.error("expected default value")),
        };
        self.advance();
        Ok(literal)
    }

    fn parse_create_index(&mut self) -> Result<CreateIndexStmt> {
        let unique = self.match_token(TokenKind::Unique);
        self.expect(TokenKind::Index)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::On)?;
        let table = self.parse_identifier()?;
        self.expect(TokenKind::LParen)?;

        let mut columns = Vec::new();
        loop {
            let name = self.parse_identifier()?;
            let nocase = if self.match_token(TokenKind::Collate) {
                self.expect(TokenKind::Nocase)?;
                true
            } else {
                false
            };
            columns.push(IndexedColumn { name, nocase });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(CreateIndexStmt {
            name,
            table,
            unique,
            if_not_exists,
            columns,
        })
    }

    // ---- INSERT ----

    fn parse_insert(&mut self) -> Result<InsertStmt> {
        self.expect(TokenKind::Insert)?;
        self.expect(TokenKind::Into)?;
        let table = self.parse_identifier()?;

        self.expect(TokenKind::LParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::Values)?;
        let mut rows = Vec::new();
        loop {
            self.expect(TokenKind::LParen)?;
            let mut values = Vec::new();
            loop {
                values.push(self.parse_value()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            if values.len() != columns.len() {
                return Err(self.error(&format!(
                    "expected {} values, found {}",
                    columns.len(),
                    values.len()
                )));
            }
            self.expect(TokenKind::RParen)?;
            rows.push(values);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let returning = if self.match_token(TokenKind::Returning) {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        Ok(InsertStmt {
            table,
            columns,
            rows,
            returning,
        })
    }

    /// Value position: literals, generators, and bare words kept raw.
    fn parse_value(&mut self) -> Result<Literal> {
        let literal = match self.peek_kind() {
            Some(TokenKind::Identifier) | Some(TokenKind::QuotedIdent) => {
                let literal = Literal::new(LiteralKind::Raw, self.lexeme());
                self.advance();
                literal
            }
            _ => self.parse_default_literal()?,
        };
        Ok(literal)
    }

    // ---- SELECT ----

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.expect(TokenKind::Select)?;

        let mut projections = Vec::new();
        let distinct = if self.match_token(TokenKind::Distinct) {
            if self.match_token(TokenKind::On) {
                self.expect(TokenKind::LParen)?;
                let mut keys = Vec::new();
                loop {
                    keys.push(self.parse_column_ref()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                projections.extend(keys.iter().cloned().map(Projection::Column));
                Some(Distinct::On(keys))
            } else {
                Some(Distinct::All)
            }
        } else {
            None
        };

        loop {
            projections.push(self.parse_projection()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::From)?;
        let from = self.parse_identifier_list()?;

        let mut joins = Vec::new();
        while self.match_token(TokenKind::Join) {
            let table = self.parse_identifier()?;
            self.expect(TokenKind::On)?;
            let left = self.parse_column_ref()?;
            self.expect(TokenKind::Eq)?;
            let right = self.parse_column_ref()?;
            joins.push(Join { table, left, right });
        }

        let where_clause = if self.match_token(TokenKind::Where) {
            self.parse_conditions()?
        } else {
            vec![Condition::True]
        };

        let mut order_by = Vec::new();
        if self.match_token(TokenKind::Order) {
            self.expect(TokenKind::By)?;
            loop {
                let column = self.parse_column_ref()?;
                let descending = if self.match_token(TokenKind::Desc) {
                    true
                } else {
                    self.match_token(TokenKind::Asc);
                    false
                };
                order_by.push(OrderBy { column, descending });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        let limit = if self.match_token(TokenKind::Limit) {
            Some(self.parse_count()?)
        } else {
            None
        };
        let offset = if self.match_token(TokenKind::Offset) {
            Some(self.parse_count()?)
        } else {
            None
        };

        let for_update = if self.match_token(TokenKind::For) {
            self.expect(TokenKind::Update)?;
            true
        } else {
            false
        };

        Ok(SelectStmt {
            distinct,
            projections,
            from,
            joins,
            where_clause,
            order_by,
            limit,
            offset,
            for_update,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.match_token(TokenKind::Star) {
            return Ok(Projection::Star);
        }
        if self.is(TokenKind::Count) && self.next_kind() == Some(TokenKind::LParen) {
            self.advance();
            self.advance();
            let arg = if self.match_token(TokenKind::Star) {
                CountArg::Star
            } else {
                CountArg::Column(self.parse_column_ref()?)
            };
            self.expect(TokenKind::RParen)?;
            return Ok(Projection::Count(arg));
        }
        Ok(Projection::Column(self.parse_column_ref()?))
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.parse_identifier()?;
        if self.match_token(TokenKind::Period) {
            let name = self.parse_identifier()?;
            Ok(ColumnRef::qualified(first, name))
        } else {
            Ok(ColumnRef::new(first))
        }
    }

    fn parse_count(&mut self) -> Result<u64> {
        if !self.is(TokenKind::Number) {
            return Err(self.error("expected a row count"));
        }
        let count = self
            .lexeme()
            .parse::<u64>()
            .map_err(|_| self.error("expected a non-negative integer"))?;
        self.advance();
        Ok(count)
    }

    // ---- WHERE ----

    fn parse_conditions(&mut self) -> Result<Vec<Condition>> {
        let mut conditions = Vec::new();
        loop {
            conditions.push(self.parse_condition()?);
            if self.is(TokenKind::Or) {
                return Err(self.error("OR is not supported"));
            }
            if !self.match_token(TokenKind::And) {
                break;
            }
        }
        Ok(conditions)
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        if self.match_token(TokenKind::LParen) {
            let condition = self.parse_condition()?;
            self.expect(TokenKind::RParen)?;
            return Ok(condition);
        }

        // WHERE 1 and WHERE 1 = 1
        if self.is(TokenKind::Number) && self.lexeme() == "1" {
            self.advance();
            if self.match_token(TokenKind::Eq) {
                if !(self.is(TokenKind::Number) && self.lexeme() == "1") {
                    return Err(self.error("expected 1 = 1"));
                }
                self.advance();
            }
            return Ok(Condition::True);
        }

        let column = self.parse_column_ref()?;

        if self.match_token(TokenKind::Is) {
            let negated = self.match_token(TokenKind::Not);
            self.expect(TokenKind::Null)?;
            return Ok(Condition::IsNull { column, negated });
        }

        let negated = self.match_token(TokenKind::Not);
        if self.match_token(TokenKind::In) {
            self.expect(TokenKind::LParen)?;
            let mut values = Vec::new();
            loop {
                values.push(self.parse_value()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Condition::In {
                column,
                values,
                negated,
            });
        }
        if negated {
            return Err(self.error("expected IN after NOT"));
        }

        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => CompareOp::Eq,
            Some(TokenKind::Ne) => CompareOp::Ne,
            Some(TokenKind::Lt) => CompareOp::Lt,
            Some(TokenKind::Gt) => CompareOp::Gt,
            Some(TokenKind::Le) => CompareOp::Le,
            Some(TokenKind::Ge) => CompareOp::Ge,
            _ => return Err(self.error("expected comparison operator")),
        };
        self.advance();
        let value = self.parse_value()?;
        Ok(Condition::Compare { column, op, value })
    }

    // ---- UPDATE / DELETE / TRUNCATE / DROP / GRANT ----

    fn parse_update(&mut self) -> Result<UpdateStmt> {
        self.expect(TokenKind::Update)?;
        let table = self.parse_identifier()?;
        self.expect(TokenKind::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_value()?;
            assignments.push((column, value));
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        let where_clause = if self.match_token(TokenKind::Where) {
            self.parse_conditions()?
        } else {
            vec![Condition::True]
        };

        Ok(UpdateStmt {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        self.expect(TokenKind::Delete)?;
        self.expect(TokenKind::From)?;
        let table = self.parse_identifier()?;
        let where_clause = if self.match_token(TokenKind::Where) {
            self.parse_conditions()?
        } else {
            Vec::new()
        };
        Ok(DeleteStmt {
            table,
            where_clause,
        })
    }

    fn parse_truncate(&mut self) -> Result<TruncateStmt> {
        self.expect(TokenKind::Truncate)?;
        self.match_token(TokenKind::Table);
        let table = self.parse_identifier()?;
        Ok(TruncateStmt { table })
    }

    fn parse_drop(&mut self) -> Result<DropTableStmt> {
        self.expect(TokenKind::Drop)?;
        self.expect(TokenKind::Table)?;
        let if_exists = if self.match_token(TokenKind::If) {
            self.expect(TokenKind::Exists)?;
            true
        } else {
            false
        };
        let table = self.parse_identifier()?;
        Ok(DropTableStmt { table, if_exists })
    }

    fn parse_grant(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Grant)?;
        while !self.is_at_end() && !self.is(TokenKind::Semicolon) {
            self.advance();
        }
        Ok(Statement::Grant)
    }

    // ---- Helpers ----

    fn parse_identifier(&mut self) -> Result<String> {
        match self.current() {
            Some(token)
                if matches!(token.kind, TokenKind::Identifier | TokenKind::QuotedIdent)
                    || token.kind.is_soft_keyword()
                    || (token.kind == TokenKind::Count
                        && self.next_kind() != Some(TokenKind::LParen)) =>
            {
                let name = token.lexeme.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = Vec::new();
        loop {
            list.push(self.parse_identifier()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    /// Kind of the token after the current one
    fn next_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.position + 1).map(|t| t.kind)
    }

    fn lexeme(&self) -> &str {
        self.current().map(|t| t.lexeme.as_str()).unwrap_or("")
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.is(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.match_token(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    /// Syntax error carrying the current token and its neighbours.
    fn error(&self, msg: &str) -> EngineError {
        let lexeme_at = |index: Option<usize>| {
            index
                .and_then(|i| self.tokens.get(i))
                .map(|t| t.lexeme.clone())
        };
        let current = lexeme_at(Some(self.position)).unwrap_or_else(|| "end of input".to_string());
        let previous = lexeme_at(self.position.checked_sub(1));
        let next = lexeme_at(Some(self.position + 1));

        let mut context = String::new();
        if let Some(previous) = previous {
            context.push_str(&previous);
            context.push(' ');
        }
        context.push_str(&format!("[{}]", current));
        if let Some(next) = next {
            context.push(' ');
            context.push_str(&next);
        }
        EngineError::syntax(msg, context)
    }
}
