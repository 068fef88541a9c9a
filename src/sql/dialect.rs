//! Backend-specific SQL spelling.

use crate::models::DatabaseType;

/// Parameter carrying the number of rows skipped by a window clause.
pub const PAGE_OFFSET_PARAM: &str = "__page_offset";
/// Parameter carrying the window size.
pub const PAGE_SIZE_PARAM: &str = "__page_size";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `"quoted"` identifiers, `$n` placeholders, `RETURNING`.
    Postgres,
    /// Backtick identifiers, `?` placeholders, `LAST_INSERT_ID()`.
    MySql,
    /// `"quoted"` identifiers, `?` placeholders, `RETURNING`.
    Sqlite,
}

/// How an INSERT hands back a database-generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    Returning,
    LastInsertId,
}

impl Dialect {
    pub fn database_type(self) -> DatabaseType {
        match self {
            Dialect::Postgres => DatabaseType::PostgreSQL,
            Dialect::MySql => DatabaseType::MySQL,
            Dialect::Sqlite => DatabaseType::SQLite,
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote(self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for c in ident.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Window clause using the `@__page_offset` and `@__page_size` parameters.
    pub fn window_clause(self) -> String {
        match self {
            Dialect::Postgres => format!(
                "OFFSET @{} ROWS FETCH NEXT @{} ROWS ONLY",
                PAGE_OFFSET_PARAM, PAGE_SIZE_PARAM
            ),
            Dialect::MySql | Dialect::Sqlite => {
                format!("LIMIT @{} OFFSET @{}", PAGE_SIZE_PARAM, PAGE_OFFSET_PARAM)
            }
        }
    }

    pub fn identity_strategy(self) -> IdentityStrategy {
        match self {
            Dialect::Postgres | Dialect::Sqlite => IdentityStrategy::Returning,
            Dialect::MySql => IdentityStrategy::LastInsertId,
        }
    }
}

impl From<DatabaseType> for Dialect {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::PostgreSQL => Dialect::Postgres,
            DatabaseType::MySQL => Dialect::MySql,
            DatabaseType::SQLite => Dialect::Sqlite,
        }
    }
}
