//! Declarative entity descriptions.
//!
//! An entity describes its table once through [`Entity::describe`]. The
//! description is raw: nothing is checked here. [`super::registry`] turns it
//! into validated [`super::TableMetadata`].
//!
//! # Example
//!
//! ```ignore
//! impl Entity for Category {
//!     fn describe(schema: &mut EntitySchema<Self>) {
//!         schema.table("categories");
//!         schema
//!             .primary_key("id")
//!             .read(|c: &Category| c.id.into())
//!             .write(|c: &mut Category, v| {
//!                 c.id = FromSqlValue::from_sql_value(v)?;
//!                 Ok(())
//!             });
//!         schema
//!             .column("name")
//!             .read(|c: &Category| c.name.clone().into())
//!             .write(|c: &mut Category, v| {
//!                 c.name = FromSqlValue::from_sql_value(v)?;
//!                 Ok(())
//!             });
//!     }
//! }
//! ```
//!
//! Most entities use [`crate::impl_entity!`] instead of writing this by hand.

use crate::error::DbResult;
use crate::models::SqlValue;

/// Reads a column value out of an entity.
pub type Reader<T> = fn(&T) -> SqlValue;

/// Writes a decoded column value into an entity.
pub type Writer<T> = fn(&mut T, SqlValue) -> DbResult<()>;

/// A type mapped to one relational table.
///
/// Rows are materialised by starting from `Default::default()` and applying
/// each column's writer.
pub trait Entity: Default + Send + Sync + Unpin + 'static {
    fn describe(schema: &mut EntitySchema<Self>);
}

/// How the primary key value comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGeneration {
    /// The database assigns the key; INSERT omits it and returns the new value.
    Identity,
    /// The caller supplies the key; INSERT includes it.
    Assigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnRole {
    PrimaryKey(KeyGeneration),
    Data,
}

pub(crate) struct ColumnSpec<T> {
    pub(crate) name: String,
    pub(crate) role: ColumnRole,
    pub(crate) read: Option<Reader<T>>,
    pub(crate) write: Option<Writer<T>>,
}

/// Raw, unvalidated description of an entity's table.
pub struct EntitySchema<T> {
    pub(crate) entity: &'static str,
    pub(crate) table: Option<String>,
    pub(crate) columns: Vec<ColumnSpec<T>>,
}

impl<T: 'static> EntitySchema<T> {
    pub(crate) fn new() -> Self {
        Self {
            entity: short_type_name::<T>(),
            table: None,
            columns: Vec::new(),
        }
    }

    /// Set the table name.
    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.table = Some(name.into());
        self
    }

    /// Declare the primary-key column (database-generated unless `.assigned()`).
    pub fn primary_key(&mut self, name: impl Into<String>) -> ColumnBuilder<'_, T> {
        self.push(name.into(), ColumnRole::PrimaryKey(KeyGeneration::Identity))
    }

    /// Declare a data column.
    pub fn column(&mut self, name: impl Into<String>) -> ColumnBuilder<'_, T> {
        self.push(name.into(), ColumnRole::Data)
    }

    fn push(&mut self, name: String, role: ColumnRole) -> ColumnBuilder<'_, T> {
        self.columns.push(ColumnSpec {
            name,
            role,
            read: None,
            write: None,
        });
        let last = self.columns.len() - 1;
        ColumnBuilder {
            spec: &mut self.columns[last],
        }
    }
}

/// Attaches accessors to a declared column.
pub struct ColumnBuilder<'a, T> {
    spec: &'a mut ColumnSpec<T>,
}

impl<T> ColumnBuilder<'_, T> {
    pub fn read(self, reader: Reader<T>) -> Self {
        self.spec.read = Some(reader);
        self
    }

    pub fn write(self, writer: Writer<T>) -> Self {
        self.spec.write = Some(writer);
        self
    }

    /// Mark a primary key as caller-supplied. No effect on data columns.
    pub fn assigned(self) -> Self {
        if let ColumnRole::PrimaryKey(_) = self.spec.role {
            self.spec.role = ColumnRole::PrimaryKey(KeyGeneration::Assigned);
        }
        self
    }
}

/// Type name without its module path, for error messages.
pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    match full.split('<').next() {
        Some(head) => {
            let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
            &full[start..]
        }
        None => full,
    }
}
