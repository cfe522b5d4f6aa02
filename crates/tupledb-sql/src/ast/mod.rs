//! SQL parsing for TupleDB.
//!
//! SQL text is parsed with the `sqlparser` crate (PostgreSQL dialect) and
//! lowered into the subset this engine executes: CREATE TABLE, INSERT,
//! DELETE, and SELECT, each carrying only the fields the engine consumes.
//! Anything outside the subset lowers to [`ParseError::Unsupported`], so
//! execution only ever sees statements it fully understands.

use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;

use crate::error::ParseError;
use crate::value::{INT4_TOKEN, TEXT_TOKEN};

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// SQL parser producing the executable statement subset.
pub struct Parser;

impl Parser {
    /// Parses a SQL string into a list of statements.
    pub fn parse(sql: &str) -> ParseResult<Vec<Statement>> {
        Self::parse_raw(sql)?
            .into_iter()
            .map(Statement::from_sql_ast)
            .collect()
    }

    /// Parses exactly one statement, the contract of a wire `Query`.
    ///
    /// The statement count is checked before lowering, so a multi-
    /// statement query is rejected as such even when the individual
    /// statements are outside the supported subset.
    pub fn parse_one(sql: &str) -> ParseResult<Statement> {
        let mut ast = Self::parse_raw(sql)?;
        if ast.len() != 1 {
            return Err(ParseError::MultipleStatements(ast.len()));
        }
        Statement::from_sql_ast(ast.remove(0))
    }

    fn parse_raw(sql: &str) -> ParseResult<Vec<sql_ast::Statement>> {
        if sql.trim().is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let dialect = PostgreSqlDialect {};
        let ast = SqlParser::parse_sql(&dialect, sql)?;

        if ast.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        Ok(ast)
    }
}

/// A parsed statement in the supported subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE.
    CreateTable(CreateTableStatement),
    /// INSERT ... VALUES.
    Insert(InsertStatement),
    /// Unconditional DELETE FROM.
    Delete(DeleteStatement),
    /// SELECT of bare columns from one table.
    Select(SelectStatement),
}

impl Statement {
    /// Converts from sqlparser's Statement.
    pub fn from_sql_ast(stmt: sql_ast::Statement) -> ParseResult<Self> {
        match stmt {
            sql_ast::Statement::Query(query) => {
                Ok(Statement::Select(SelectStatement::from_sql_ast(*query)?))
            }
            sql_ast::Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => Ok(Statement::Insert(InsertStatement::from_parts(
                table_name, columns, source,
            )?)),
            sql_ast::Statement::Delete {
                from, selection, ..
            } => Ok(Statement::Delete(DeleteStatement::from_parts(
                from, selection,
            )?)),
            sql_ast::Statement::CreateTable {
                name,
                columns,
                constraints,
                ..
            } => Ok(Statement::CreateTable(CreateTableStatement::from_parts(
                name,
                columns,
                constraints,
            )?)),
            other => Err(ParseError::Unsupported(format!(
                "statement: {}",
                first_token(&other.to_string())
            ))),
        }
    }
}

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// Table name.
    pub table: String,
    /// Column definitions in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl CreateTableStatement {
    fn from_parts(
        name: sql_ast::ObjectName,
        columns: Vec<sql_ast::ColumnDef>,
        constraints: Vec<sql_ast::TableConstraint>,
    ) -> ParseResult<Self> {
        if !constraints.is_empty() {
            return Err(ParseError::Unsupported("table constraints".to_string()));
        }

        let columns: ParseResult<Vec<_>> =
            columns.into_iter().map(ColumnDef::from_sql_ast).collect();

        Ok(Self {
            table: table_name_from(&name)?,
            columns: columns?,
        })
    }
}

/// A column definition: name plus its namespaced type token.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Dotted type token, e.g. `pg_catalog.int4` or `text`.
    pub type_token: String,
}

impl ColumnDef {
    fn from_sql_ast(col: sql_ast::ColumnDef) -> ParseResult<Self> {
        let type_token = match &col.data_type {
            sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::Int4(_) => INT4_TOKEN,
            sql_ast::DataType::Text => TEXT_TOKEN,
            other => {
                return Err(ParseError::Unsupported(format!("column type {}", other)));
            }
        };

        Ok(Self {
            name: col.name.value,
            type_token: type_token.to_string(),
        })
    }
}

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// One literal row per VALUES tuple, positional.
    pub rows: Vec<Vec<Literal>>,
}

impl InsertStatement {
    fn from_parts(
        table_name: sql_ast::ObjectName,
        columns: Vec<sql_ast::Ident>,
        source: Option<Box<sql_ast::Query>>,
    ) -> ParseResult<Self> {
        if !columns.is_empty() {
            return Err(ParseError::Unsupported(
                "INSERT column list (values are positional)".to_string(),
            ));
        }

        let source =
            source.ok_or_else(|| ParseError::Syntax("INSERT without VALUES".to_string()))?;

        let rows = match *source.body {
            sql_ast::SetExpr::Values(values) => values
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(Literal::from_sql_ast).collect())
                .collect::<ParseResult<Vec<Vec<_>>>>()?,
            _ => {
                return Err(ParseError::Unsupported(
                    "INSERT source other than VALUES".to_string(),
                ));
            }
        };

        Ok(Self {
            table: table_name_from(&table_name)?,
            rows,
        })
    }
}

/// DELETE statement. No WHERE clause: deletes every row of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    /// Target table.
    pub table: String,
}

impl DeleteStatement {
    fn from_parts(
        from: sql_ast::FromTable,
        selection: Option<sql_ast::Expr>,
    ) -> ParseResult<Self> {
        if selection.is_some() {
            return Err(ParseError::Unsupported("WHERE in DELETE".to_string()));
        }

        // Both forms carry the same table list; the keyword is noise here.
        let tables = match from {
            sql_ast::FromTable::WithFromKeyword(tables)
            | sql_ast::FromTable::WithoutKeyword(tables) => tables,
        };

        Ok(Self {
            table: single_table(&tables)?,
        })
    }
}

/// SELECT statement: bare column targets from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// FROM relation.
    pub table: String,
    /// Target column names in client order.
    pub targets: Vec<String>,
}

impl SelectStatement {
    /// Converts from sqlparser's Query.
    pub fn from_sql_ast(query: sql_ast::Query) -> ParseResult<Self> {
        if query.with.is_some() {
            return Err(ParseError::Unsupported("WITH".to_string()));
        }
        if !query.order_by.is_empty() {
            return Err(ParseError::Unsupported("ORDER BY".to_string()));
        }
        if query.limit.is_some() || query.offset.is_some() {
            return Err(ParseError::Unsupported("LIMIT/OFFSET".to_string()));
        }

        let select = match *query.body {
            sql_ast::SetExpr::Select(select) => select,
            _ => {
                return Err(ParseError::Unsupported(
                    "set expression other than SELECT".to_string(),
                ));
            }
        };

        if select.distinct.is_some() {
            return Err(ParseError::Unsupported("DISTINCT".to_string()));
        }
        if select.selection.is_some() {
            return Err(ParseError::Unsupported("WHERE in SELECT".to_string()));
        }
        if select.having.is_some() {
            return Err(ParseError::Unsupported("HAVING".to_string()));
        }
        match &select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs) if exprs.is_empty() => {}
            _ => return Err(ParseError::Unsupported("GROUP BY".to_string())),
        }

        let targets: ParseResult<Vec<_>> = select
            .projection
            .into_iter()
            .map(|item| match item {
                sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Identifier(ident)) => {
                    Ok(ident.value)
                }
                other => Err(ParseError::Unsupported(format!(
                    "SELECT target {} (only bare columns)",
                    other
                ))),
            })
            .collect();

        Ok(Self {
            table: single_table(&select.from)?,
            targets: targets?,
        })
    }
}

/// An INSERT constant.
///
/// `Float` and `Null` are carried through parsing so the row store can
/// reject them as unsupported values rather than as syntax errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Signed integer literal.
    Integer(i64),
    /// String literal.
    Text(String),
    /// Numeric literal that does not fit an i64 (kept verbatim).
    Float(String),
    /// NULL.
    Null,
}

impl Literal {
    fn from_sql_ast(expr: sql_ast::Expr) -> ParseResult<Self> {
        match expr {
            sql_ast::Expr::Value(value) => Self::from_value(value, false),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Minus,
                expr,
            } => match *expr {
                sql_ast::Expr::Value(value) => Self::from_value(value, true),
                other => Err(ParseError::Unsupported(format!(
                    "expression in VALUES: {}",
                    other
                ))),
            },
            other => Err(ParseError::Unsupported(format!(
                "expression in VALUES: {}",
                other
            ))),
        }
    }

    fn from_value(value: sql_ast::Value, negated: bool) -> ParseResult<Self> {
        match value {
            sql_ast::Value::Number(repr, _) => match repr.parse::<i64>() {
                Ok(n) if negated => Ok(Literal::Integer(-n)),
                Ok(n) => Ok(Literal::Integer(n)),
                Err(_) if negated => Ok(Literal::Float(format!("-{}", repr))),
                Err(_) => Ok(Literal::Float(repr)),
            },
            sql_ast::Value::SingleQuotedString(s) if !negated => Ok(Literal::Text(s)),
            sql_ast::Value::Null if !negated => Ok(Literal::Null),
            other => Err(ParseError::Unsupported(format!(
                "constant in VALUES: {}",
                other
            ))),
        }
    }
}

fn table_name_from(name: &sql_ast::ObjectName) -> ParseResult<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(ParseError::Unsupported(format!(
            "qualified table name {}",
            name
        ))),
    }
}

fn single_table(from: &[sql_ast::TableWithJoins]) -> ParseResult<String> {
    let table = match from {
        [table] => table,
        [] => return Err(ParseError::Syntax("missing FROM clause".to_string())),
        _ => return Err(ParseError::Unsupported("multiple FROM tables".to_string())),
    };

    if !table.joins.is_empty() {
        return Err(ParseError::Unsupported("JOIN".to_string()));
    }

    match &table.relation {
        sql_ast::TableFactor::Table { name, .. } => table_name_from(name),
        other => Err(ParseError::Unsupported(format!("FROM item {}", other))),
    }
}

fn first_token(sql: &str) -> String {
    sql.split_whitespace().next().unwrap_or("").to_string()
}
