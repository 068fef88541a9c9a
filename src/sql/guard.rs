//! Read-only enforcement for caller-supplied SQL.
//!
//! Bespoke SQL passed to the query operations and the paginator must be a
//! single query statement. Uses [sqlparser](https://docs.rs/sqlparser/) on the
//! placeholder-rewritten text so `@name` parameters parse on every backend.

use super::statement::rewrite_placeholders;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

mod error_messages {
    pub const WRITE: &str = "Only SELECT queries are allowed here. Use execute for writes.";
    pub const MULTIPLE: &str = "Exactly one statement is allowed per query.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
}

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Check that `sql` is exactly one read-only query.
///
/// Returns `Err(DbError::InvalidInput)` when the text does not parse or holds
/// several statements, and `Err(DbError::Permission)` for anything that is
/// not a query.
pub fn validate_query(sql: &str, db_type: DatabaseType) -> DbResult<()> {
    let (rewritten, _) = rewrite_placeholders(sql, db_type);
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), &rewritten).map_err(|e| {
        DbError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    match statements.as_slice() {
        [] => Err(DbError::invalid_input("Empty SQL statement")),
        [Statement::Query(_)] => Ok(()),
        [other] => Err(DbError::permission(
            statement_name(other),
            error_messages::WRITE,
        )),
        _ => Err(DbError::invalid_input(error_messages::MULTIPLE)),
    }
}

fn statement_name(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::Merge { .. } => "MERGE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::StartTransaction { .. } => "BEGIN",
        Statement::Commit { .. } => "COMMIT",
        Statement::Rollback { .. } => "ROLLBACK",
        Statement::Pragma { .. } => "PRAGMA",
        _ => "statement",
    }
}
