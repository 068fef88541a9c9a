//! Read operations for entities and bespoke queries.

use crate::db::session::Session;
use crate::db::types::Record;
use crate::error::{DbError, DbResult};
use crate::metadata::{Entity, TableMetadata};
use crate::models::SqlValue;
use crate::sql::{Params, Statement, validate_query};

impl Session {
    /// The entity whose primary key equals `id`, if any.
    pub async fn get_by_id<T: Entity>(&mut self, id: impl Into<SqlValue>) -> DbResult<Option<T>> {
        let generator = self.generator::<T>()?;
        let stmt = generator.select_by_id(id.into());
        match self.fetch_optional_record(&stmt).await? {
            Some(record) => Ok(Some(generator.metadata().materialize(record)?)),
            None => Ok(None),
        }
    }

    /// Entities whose `field` column equals `value`.
    pub async fn get_by_field<T: Entity>(
        &mut self,
        field: &str,
        value: impl Into<SqlValue>,
    ) -> DbResult<Vec<T>> {
        let generator = self.generator::<T>()?;
        let stmt = generator.select_by_field(field, value.into())?;
        let records = self.fetch_records(&stmt).await?;
        materialize_all(generator.metadata(), records)
    }

    /// Entities whose `field` column is one of `values`.
    ///
    /// An empty list returns an empty result without querying the database.
    pub async fn get_where_in<T, V>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> DbResult<Vec<T>>
    where
        T: Entity,
        V: Into<SqlValue>,
    {
        let generator = self.generator::<T>()?;
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        let Some(stmt) = generator.select_where_in(field, values)? else {
            return Ok(Vec::new());
        };
        let records = self.fetch_records(&stmt).await?;
        materialize_all(generator.metadata(), records)
    }

    pub async fn get_all<T: Entity>(&mut self) -> DbResult<Vec<T>> {
        let generator = self.generator::<T>()?;
        let records = self.fetch_records(&generator.select_all()).await?;
        materialize_all(generator.metadata(), records)
    }

    pub async fn exists_by_id<T: Entity>(&mut self, id: impl Into<SqlValue>) -> DbResult<bool> {
        let stmt = self.generator::<T>()?.exists_by_id(id.into());
        self.fetch_flag(&stmt).await
    }

    pub async fn exists_by_field<T: Entity>(
        &mut self,
        field: &str,
        value: impl Into<SqlValue>,
    ) -> DbResult<bool> {
        let stmt = self.generator::<T>()?.exists_by_field(field, value.into())?;
        self.fetch_flag(&stmt).await
    }

    pub async fn count_by_field<T: Entity>(
        &mut self,
        field: &str,
        value: impl Into<SqlValue>,
    ) -> DbResult<u64> {
        let stmt = self.generator::<T>()?.count_by_field(field, value.into())?;
        self.fetch_count(&stmt).await
    }

    pub async fn count_all<T: Entity>(&mut self) -> DbResult<u64> {
        let stmt = self.generator::<T>()?.count_all();
        self.fetch_count(&stmt).await
    }

    /// Run a bespoke read-only query and materialise each row as `T`.
    ///
    /// `sql` uses `@name` placeholders bound from `params`. Result columns
    /// are matched to `T`'s columns by name; missing ones keep their default.
    pub async fn query<T: Entity>(&mut self, sql: &str, params: &Params) -> DbResult<Vec<T>> {
        let generator = self.generator::<T>()?;
        let records = self.query_records(sql, params).await?;
        materialize_all(generator.metadata(), records)
    }

    /// Run a bespoke read-only query and return the raw rows.
    pub async fn query_records(&mut self, sql: &str, params: &Params) -> DbResult<Vec<Record>> {
        validate_query(sql, self.db_type())?;
        self.fetch_records(&Statement::new(sql, params.clone())).await
    }

    pub(crate) async fn fetch_count(&mut self, stmt: &Statement) -> DbResult<u64> {
        match self.fetch_scalar(stmt).await? {
            Some(SqlValue::Int(n)) => u64::try_from(n)
                .map_err(|_| DbError::decode(format!("negative row count {n}"))),
            // Some drivers report COUNT(*) as a decimal string
            Some(SqlValue::Text(s)) => s
                .trim()
                .parse()
                .map_err(|_| DbError::decode(format!("row count '{s}' is not an integer"))),
            Some(other) => Err(DbError::decode(format!(
                "row count has unexpected type {}",
                other.type_name()
            ))),
            None => Ok(0),
        }
    }

    async fn fetch_flag(&mut self, stmt: &Statement) -> DbResult<bool> {
        Ok(match self.fetch_scalar(stmt).await? {
            Some(SqlValue::Int(n)) => n != 0,
            Some(SqlValue::Bool(b)) => b,
            _ => false,
        })
    }
}

fn materialize_all<T: Entity>(metadata: &TableMetadata<T>, records: Vec<Record>) -> DbResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| metadata.materialize(record))
        .collect()
}
