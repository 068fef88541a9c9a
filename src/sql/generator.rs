//! Parameterised SQL built from table metadata.
//!
//! Identifiers always come from validated metadata and are quoted for the
//! target dialect. Values always travel as named parameters. The only text
//! copied verbatim into a statement is a [`TrustedExpression`] ordering.
//!
//! [`TrustedExpression`]: super::TrustedExpression

use super::dialect::{Dialect, IdentityStrategy, PAGE_OFFSET_PARAM, PAGE_SIZE_PARAM};
use super::order::OrderBy;
use super::statement::{Params, Statement};
use crate::error::DbResult;
use crate::metadata::{ColumnMetadata, Entity, KeyGeneration, TableMetadata, table_metadata};
use crate::models::{PaginationParams, SqlValue};
use std::sync::Arc;

/// Where the key of a freshly inserted row comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertKey {
    /// The statement returns the generated key as its single column.
    Returning,
    /// Read the connection's last insert id after executing.
    LastInsertId,
    /// The caller supplied the key; it is this value.
    Assigned(SqlValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub statement: Statement,
    pub key: InsertKey,
}

/// Count and window statements for one paginated request.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStatements {
    pub count: Statement,
    pub page: Statement,
}

pub struct SqlGenerator<T> {
    metadata: Arc<TableMetadata<T>>,
    dialect: Dialect,
}

impl<T: Entity> SqlGenerator<T> {
    /// Generator for `T` using its cached metadata.
    pub fn new(dialect: Dialect) -> DbResult<Self> {
        Ok(Self::with_metadata(table_metadata::<T>()?, dialect))
    }

    pub fn with_metadata(metadata: Arc<TableMetadata<T>>, dialect: Dialect) -> Self {
        Self { metadata, dialect }
    }

    pub fn metadata(&self) -> &TableMetadata<T> {
        &self.metadata
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    fn table(&self) -> String {
        self.quote(self.metadata.table_name())
    }

    fn select_list(&self) -> String {
        self.metadata
            .all_columns()
            .map(|c| self.quote(c.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_prefix(&self) -> String {
        format!("SELECT {} FROM {}", self.select_list(), self.table())
    }

    /// `"col" = @col` with the value bound.
    fn equals(&self, column: &ColumnMetadata<T>, value: SqlValue, params: &mut Params) -> String {
        params.bind(column.name(), value);
        format!("{} = @{}", self.quote(column.name()), column.name())
    }

    /// `"col" IN (@col_0, ...)`, or `None` for an empty list.
    fn in_list(
        &self,
        column: &ColumnMetadata<T>,
        values: Vec<SqlValue>,
        params: &mut Params,
    ) -> Option<String> {
        if values.is_empty() {
            return None;
        }
        let placeholders: Vec<String> = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let name = format!("{}_{}", column.name(), i);
                params.bind(name.as_str(), value);
                format!("@{}", name)
            })
            .collect();
        Some(format!(
            "{} IN ({})",
            self.quote(column.name()),
            placeholders.join(", ")
        ))
    }

    pub fn select_all(&self) -> Statement {
        Statement::new(self.select_prefix(), Params::new())
    }

    pub fn select_by_id(&self, id: SqlValue) -> Statement {
        let mut params = Params::new();
        let predicate = self.equals(self.metadata.primary_key(), id, &mut params);
        Statement::new(format!("{} WHERE {}", self.select_prefix(), predicate), params)
    }

    pub fn select_by_field(&self, field: &str, value: SqlValue) -> DbResult<Statement> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        let predicate = self.equals(column, value, &mut params);
        Ok(Statement::new(
            format!("{} WHERE {}", self.select_prefix(), predicate),
            params,
        ))
    }

    /// `None` when `values` is empty: there is nothing to select.
    pub fn select_where_in(&self, field: &str, values: Vec<SqlValue>) -> DbResult<Option<Statement>> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        Ok(self.in_list(column, values, &mut params).map(|predicate| {
            Statement::new(
                format!("{} WHERE {}", self.select_prefix(), predicate),
                params,
            )
        }))
    }

    fn exists(&self, predicate: String, params: Params) -> Statement {
        Statement::new(
            format!(
                "SELECT CASE WHEN EXISTS (SELECT 1 FROM {} WHERE {}) THEN 1 ELSE 0 END AS present",
                self.table(),
                predicate
            ),
            params,
        )
    }

    pub fn exists_by_id(&self, id: SqlValue) -> Statement {
        let mut params = Params::new();
        let predicate = self.equals(self.metadata.primary_key(), id, &mut params);
        self.exists(predicate, params)
    }

    pub fn exists_by_field(&self, field: &str, value: SqlValue) -> DbResult<Statement> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        let predicate = self.equals(column, value, &mut params);
        Ok(self.exists(predicate, params))
    }

    pub fn count_all(&self) -> Statement {
        Statement::new(
            format!("SELECT COUNT(*) AS total FROM {}", self.table()),
            Params::new(),
        )
    }

    pub fn count_by_field(&self, field: &str, value: SqlValue) -> DbResult<Statement> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        let predicate = self.equals(column, value, &mut params);
        Ok(Statement::new(
            format!(
                "SELECT COUNT(*) AS total FROM {} WHERE {}",
                self.table(),
                predicate
            ),
            params,
        ))
    }

    /// INSERT of every data column, plus the key when it is caller-assigned.
    pub fn insert(&self, entity: &T) -> InsertStatement {
        let pk = self.metadata.primary_key();
        let assigned = self.metadata.key_generation() == KeyGeneration::Assigned;

        let mut params = Params::new();
        let mut names = Vec::new();
        let mut placeholders = Vec::new();
        let columns = self
            .metadata
            .all_columns()
            .filter(|c| assigned || c.name() != pk.name());
        for column in columns {
            params.bind(column.name(), column.read(entity));
            names.push(self.quote(column.name()));
            placeholders.push(format!("@{}", column.name()));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders.join(", ")
        );

        let key = if assigned {
            InsertKey::Assigned(pk.read(entity))
        } else {
            match self.dialect.identity_strategy() {
                IdentityStrategy::Returning => {
                    sql.push_str(" RETURNING ");
                    sql.push_str(&self.quote(pk.name()));
                    InsertKey::Returning
                }
                IdentityStrategy::LastInsertId => InsertKey::LastInsertId,
            }
        };

        InsertStatement {
            statement: Statement::new(sql, params),
            key,
        }
    }

    fn update_sql(&self, entity: &T, params: &mut Params) -> String {
        let assignments: Vec<String> = self
            .metadata
            .columns()
            .iter()
            .map(|column| self.equals(column, column.read(entity), params))
            .collect();
        let pk = self.metadata.primary_key();
        let predicate = self.equals(pk, pk.read(entity), params);
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.table(),
            assignments.join(", "),
            predicate
        )
    }

    /// UPDATE of every data column, keyed by the entity's own primary key.
    pub fn update(&self, entity: &T) -> Statement {
        let mut params = Params::new();
        let sql = self.update_sql(entity, &mut params);
        Statement::new(sql, params)
    }

    /// UPDATE that only applies while `guard_field` still holds `expected`.
    ///
    /// A null `expected` guards with `IS NULL`.
    pub fn update_guarded(
        &self,
        entity: &T,
        guard_field: &str,
        expected: SqlValue,
    ) -> DbResult<Statement> {
        let guard = self.metadata.resolve_field(guard_field)?;
        let mut params = Params::new();
        let mut sql = self.update_sql(entity, &mut params);
        if expected.is_null() {
            sql.push_str(&format!(" AND {} IS NULL", self.quote(guard.name())));
        } else {
            let name = format!("__expected_{}", guard.name());
            sql.push_str(&format!(" AND {} = @{}", self.quote(guard.name()), name));
            params.bind(name, expected);
        }
        Ok(Statement::new(sql, params))
    }

    pub fn delete_by_id(&self, id: SqlValue) -> Statement {
        let mut params = Params::new();
        let predicate = self.equals(self.metadata.primary_key(), id, &mut params);
        Statement::new(
            format!("DELETE FROM {} WHERE {}", self.table(), predicate),
            params,
        )
    }

    pub fn delete_by_field(&self, field: &str, value: SqlValue) -> DbResult<Statement> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        let predicate = self.equals(column, value, &mut params);
        Ok(Statement::new(
            format!("DELETE FROM {} WHERE {}", self.table(), predicate),
            params,
        ))
    }

    /// `None` when `values` is empty: there is nothing to delete.
    pub fn delete_where_in(&self, field: &str, values: Vec<SqlValue>) -> DbResult<Option<Statement>> {
        let column = self.metadata.resolve_field(field)?;
        let mut params = Params::new();
        Ok(self.in_list(column, values, &mut params).map(|predicate| {
            Statement::new(
                format!("DELETE FROM {} WHERE {}", self.table(), predicate),
                params,
            )
        }))
    }

    /// ORDER BY body for `order`.
    pub fn order_clause(&self, order: &OrderBy) -> DbResult<String> {
        Ok(match order {
            OrderBy::Default => format!("{} ASC", self.quote(self.metadata.primary_key().name())),
            OrderBy::Column { field, descending } => {
                let column = self.metadata.resolve_field(field)?;
                let direction = if *descending { "DESC" } else { "ASC" };
                format!("{} {}", self.quote(column.name()), direction)
            }
            OrderBy::Trusted(expression) => expression.as_sql().to_string(),
        })
    }

    /// Count over the unwindowed base query plus the ordered, windowed page.
    pub fn paginate(
        &self,
        base_query: &str,
        pagination: PaginationParams,
        params: &Params,
        order: &OrderBy,
    ) -> DbResult<PageStatements> {
        let base = base_query.trim().trim_end_matches(';').trim_end();
        let order_clause = self.order_clause(order)?;

        let count = Statement::new(
            format!("SELECT COUNT(*) AS total FROM ({}) AS page_source", base),
            params.clone(),
        );

        let mut page_params = params.clone();
        page_params
            .bind(PAGE_OFFSET_PARAM, clamp_i64(pagination.offset()))
            .bind(PAGE_SIZE_PARAM, i64::from(pagination.page_size));
        let page = Statement::new(
            format!(
                "{} ORDER BY {} {}",
                base,
                order_clause,
                self.dialect.window_clause()
            ),
            page_params,
        );

        Ok(PageStatements { count, page })
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
