//! Validated table metadata and the process-wide cache.
//!
//! Metadata for an entity type is resolved on first use, validated, and then
//! shared read-only for the rest of the process lifetime.

use super::entity::{ColumnRole, Entity, EntitySchema, KeyGeneration, Reader, Writer};
use crate::db::types::Record;
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

/// Malformed entity description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("{entity}: missing table annotation")]
    MissingTable { entity: String },

    #[error("{entity}: missing primary key annotation")]
    MissingPrimaryKey { entity: String },

    #[error("{entity}: multiple primary key annotations ({})", .columns.join(", "))]
    MultiplePrimaryKeys {
        entity: String,
        columns: Vec<String>,
    },

    #[error("{entity}: no column annotations")]
    NoColumns { entity: String },

    #[error("{entity}: column '{column}' missing {missing} accessor")]
    IncompleteAccessor {
        entity: String,
        column: String,
        /// "read", "write" or "read and write"
        missing: &'static str,
    },

    #[error("{entity}: invalid {kind} identifier '{ident}'")]
    InvalidIdentifier {
        entity: String,
        kind: &'static str,
        ident: String,
    },

    #[error("{entity}: column '{column}' declared more than once")]
    DuplicateColumn { entity: String, column: String },
}

impl MetadataError {
    /// Name of the entity type the error refers to.
    pub fn entity(&self) -> &str {
        match self {
            Self::MissingTable { entity }
            | Self::MissingPrimaryKey { entity }
            | Self::MultiplePrimaryKeys { entity, .. }
            | Self::NoColumns { entity }
            | Self::IncompleteAccessor { entity, .. }
            | Self::InvalidIdentifier { entity, .. }
            | Self::DuplicateColumn { entity, .. } => entity,
        }
    }
}

/// A mapped column with both accessors present.
pub struct ColumnMetadata<T> {
    name: String,
    read: Reader<T>,
    write: Writer<T>,
}

impl<T> ColumnMetadata<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extract this column's value from an entity.
    pub fn read(&self, entity: &T) -> SqlValue {
        (self.read)(entity)
    }

    /// Store a decoded value into an entity.
    pub fn write(&self, entity: &mut T, value: SqlValue) -> DbResult<()> {
        (self.write)(entity, value)
    }
}

impl<T> std::fmt::Debug for ColumnMetadata<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnMetadata")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Validated mapping between an entity type and its table.
#[derive(Debug)]
pub struct TableMetadata<T> {
    entity: &'static str,
    table_name: String,
    primary_key: ColumnMetadata<T>,
    key_generation: KeyGeneration,
    columns: Vec<ColumnMetadata<T>>,
}

impl<T: Entity> TableMetadata<T> {
    /// Run the entity's description and validate it.
    pub fn resolve() -> Result<Self, MetadataError> {
        let mut schema = EntitySchema::<T>::new();
        T::describe(&mut schema);
        Self::from_schema(schema)
    }

    /// Build a row-shaped entity from decoded values.
    ///
    /// Result columns are matched case-insensitively; mapped columns missing
    /// from the result keep their default value.
    pub fn materialize(&self, mut record: Record) -> DbResult<T> {
        let mut entity = T::default();
        for column in self.all_columns() {
            if let Some(value) = record.take(column.name()) {
                column.write(&mut entity, value).map_err(|e| match e {
                    DbError::Decode { message } => DbError::decode(format!(
                        "{}.{}: {}",
                        self.entity, column.name, message
                    )),
                    other => other,
                })?;
            }
        }
        Ok(entity)
    }
}

impl<T> TableMetadata<T> {
    fn from_schema(schema: EntitySchema<T>) -> Result<Self, MetadataError> {
        let entity = schema.entity.to_string();

        let table_name = match schema.table {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(MetadataError::MissingTable { entity }),
        };
        if !is_valid_identifier(&table_name) {
            return Err(MetadataError::InvalidIdentifier {
                entity,
                kind: "table",
                ident: table_name,
            });
        }

        let keys: Vec<&str> = schema
            .columns
            .iter()
            .filter(|c| matches!(c.role, ColumnRole::PrimaryKey(_)))
            .map(|c| c.name.as_str())
            .collect();
        match keys.len() {
            0 => return Err(MetadataError::MissingPrimaryKey { entity }),
            1 => {}
            _ => {
                return Err(MetadataError::MultiplePrimaryKeys {
                    entity,
                    columns: keys.into_iter().map(String::from).collect(),
                });
            }
        }
        if !schema.columns.iter().any(|c| c.role == ColumnRole::Data) {
            return Err(MetadataError::NoColumns { entity });
        }

        let mut seen: Vec<String> = Vec::with_capacity(schema.columns.len());
        let mut primary_key = None;
        let mut columns = Vec::with_capacity(schema.columns.len() - 1);
        for spec in schema.columns {
            if !is_valid_identifier(&spec.name) {
                return Err(MetadataError::InvalidIdentifier {
                    entity,
                    kind: "column",
                    ident: spec.name,
                });
            }
            if seen.iter().any(|s| s.eq_ignore_ascii_case(&spec.name)) {
                return Err(MetadataError::DuplicateColumn {
                    entity,
                    column: spec.name,
                });
            }
            seen.push(spec.name.clone());

            let (read, write) = match (spec.read, spec.write) {
                (Some(r), Some(w)) => (r, w),
                (r, w) => {
                    let missing = match (r.is_none(), w.is_none()) {
                        (true, true) => "read and write",
                        (true, false) => "read",
                        _ => "write",
                    };
                    return Err(MetadataError::IncompleteAccessor {
                        entity,
                        column: spec.name,
                        missing,
                    });
                }
            };
            let column = ColumnMetadata {
                name: spec.name,
                read,
                write,
            };
            match spec.role {
                ColumnRole::PrimaryKey(generation) => primary_key = Some((column, generation)),
                ColumnRole::Data => columns.push(column),
            }
        }

        let (primary_key, key_generation) =
            primary_key.ok_or(MetadataError::MissingPrimaryKey { entity })?;

        Ok(Self {
            entity: schema.entity,
            table_name,
            primary_key,
            key_generation,
            columns,
        })
    }

    pub fn entity_name(&self) -> &'static str {
        self.entity
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> &ColumnMetadata<T> {
        &self.primary_key
    }

    pub fn key_generation(&self) -> KeyGeneration {
        self.key_generation
    }

    /// Data columns in declaration order, primary key excluded.
    pub fn columns(&self) -> &[ColumnMetadata<T>] {
        &self.columns
    }

    /// Primary key first, then data columns.
    pub fn all_columns(&self) -> impl Iterator<Item = &ColumnMetadata<T>> {
        std::iter::once(&self.primary_key).chain(self.columns.iter())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata<T>> {
        self.all_columns().find(|c| c.name == name)
    }

    /// Look up a caller-supplied field name; unknown names are an error.
    pub fn resolve_field(&self, field: &str) -> DbResult<&ColumnMetadata<T>> {
        self.column(field)
            .ok_or_else(|| DbError::unknown_field(self.entity, field))
    }
}

type CacheMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static CACHE: LazyLock<RwLock<CacheMap>> = LazyLock::new(|| RwLock::new(HashMap::new()));

/// Resolve (once) and return the metadata for `T`.
///
/// Malformed descriptions are not cached, so every call reports the error.
pub fn table_metadata<T: Entity>() -> DbResult<Arc<TableMetadata<T>>> {
    let type_id = TypeId::of::<T>();
    {
        let cache = CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = cache.get(&type_id) {
            return downcast::<T>(Arc::clone(entry));
        }
    }

    let metadata = Arc::new(TableMetadata::<T>::resolve()?);
    debug!(
        entity = metadata.entity_name(),
        table = %metadata.table_name(),
        columns = metadata.columns().len(),
        "Resolved table metadata"
    );

    let mut cache = CACHE.write().unwrap_or_else(PoisonError::into_inner);
    // Another task may have resolved it while we were building ours
    let entry = cache
        .entry(type_id)
        .or_insert_with(|| metadata as Arc<dyn Any + Send + Sync>);
    downcast::<T>(Arc::clone(entry))
}

fn downcast<T: Entity>(entry: Arc<dyn Any + Send + Sync>) -> DbResult<Arc<TableMetadata<T>>> {
    entry
        .downcast::<TableMetadata<T>>()
        .map_err(|_| DbError::internal("metadata cache holds the wrong type"))
}

/// Identifiers must match `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
