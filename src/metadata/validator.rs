//! Startup validation of every registered entity.

use super::entity::{Entity, short_type_name};
use super::registry::{MetadataError, TableMetadata, table_metadata};
use crate::error::DbError;
use thiserror::Error;
use tracing::{error, info};

/// Every metadata problem found in one validation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} entity type(s) failed schema validation:\n{}", .failures.len(), render(.failures))]
pub struct SchemaValidationError {
    pub failures: Vec<MetadataError>,
}

fn render(failures: &[MetadataError]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

type Check = fn() -> Result<(), MetadataError>;

fn check<T: Entity>() -> Result<(), MetadataError> {
    match table_metadata::<T>() {
        Ok(_) => Ok(()),
        Err(DbError::Metadata(e)) => Err(e),
        // Cache trouble says nothing about the description itself
        Err(_) => TableMetadata::<T>::resolve().map(|_| ()),
    }
}

/// Collects entity types and validates them together at startup.
#[derive(Default)]
pub struct SchemaValidator {
    entries: Vec<(&'static str, Check)>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Entity>(&mut self) -> &mut Self {
        self.entries.push((short_type_name::<T>(), check::<T>));
        self
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every registered entity, reporting all failures together.
    ///
    /// Returns the number of entities validated on success.
    pub fn validate(&self) -> Result<usize, SchemaValidationError> {
        let failures: Vec<MetadataError> = self
            .entries
            .iter()
            .filter_map(|(name, check)| {
                check().err().inspect(|e| error!(entity = *name, error = %e, "Invalid entity metadata"))
            })
            .collect();

        if failures.is_empty() {
            info!(entities = self.entries.len(), "Schema validation passed");
            Ok(self.entries.len())
        } else {
            Err(SchemaValidationError { failures })
        }
    }
}
