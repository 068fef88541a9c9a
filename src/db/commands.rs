//! Write operations for entities and bespoke commands.

use crate::db::session::Session;
use crate::error::{DbError, DbResult};
use crate::metadata::Entity;
use crate::models::SqlValue;
use crate::sql::{InsertKey, Params, Statement};

impl Session {
    /// Insert `entity` and return its key.
    ///
    /// For database-generated keys this is the new identity value; for
    /// caller-assigned keys it is the key the entity already carries.
    pub async fn insert<T: Entity>(&mut self, entity: &T) -> DbResult<SqlValue> {
        let generator = self.generator::<T>()?;
        let insert = generator.insert(entity);
        match insert.key {
            InsertKey::Returning => self.fetch_scalar(&insert.statement).await?.ok_or_else(|| {
                DbError::internal(format!(
                    "insert into {} returned no key",
                    generator.metadata().table_name()
                ))
            }),
            InsertKey::LastInsertId => {
                let result = self.execute_statement(&insert.statement).await?;
                result.last_insert_id.map(SqlValue::Int).ok_or_else(|| {
                    DbError::internal(format!(
                        "insert into {} reported no generated key",
                        generator.metadata().table_name()
                    ))
                })
            }
            InsertKey::Assigned(key) => {
                self.execute_statement(&insert.statement).await?;
                Ok(key)
            }
        }
    }

    /// Update every data column of the row keyed by `entity`'s primary key.
    ///
    /// Returns the number of rows affected; 0 means no such row.
    pub async fn update<T: Entity>(&mut self, entity: &T) -> DbResult<u64> {
        let stmt = self.generator::<T>()?.update(entity);
        Ok(self.execute_statement(&stmt).await?.rows_affected)
    }

    pub async fn delete_by_id<T: Entity>(&mut self, id: impl Into<SqlValue>) -> DbResult<u64> {
        let stmt = self.generator::<T>()?.delete_by_id(id.into());
        Ok(self.execute_statement(&stmt).await?.rows_affected)
    }

    pub async fn delete_by_field<T: Entity>(
        &mut self,
        field: &str,
        value: impl Into<SqlValue>,
    ) -> DbResult<u64> {
        let stmt = self.generator::<T>()?.delete_by_field(field, value.into())?;
        Ok(self.execute_statement(&stmt).await?.rows_affected)
    }

    /// Delete rows whose `field` column is one of `values`.
    ///
    /// An empty list deletes nothing and does not touch the database.
    pub async fn delete_where_in<T, V>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> DbResult<u64>
    where
        T: Entity,
        V: Into<SqlValue>,
    {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        match self.generator::<T>()?.delete_where_in(field, values)? {
            Some(stmt) => Ok(self.execute_statement(&stmt).await?.rows_affected),
            None => Ok(0),
        }
    }

    /// Run a bespoke parameterised write and return the rows affected.
    pub async fn execute(&mut self, sql: &str, params: &Params) -> DbResult<u64> {
        let stmt = Statement::new(sql, params.clone());
        Ok(self.execute_statement(&stmt).await?.rows_affected)
    }
}
