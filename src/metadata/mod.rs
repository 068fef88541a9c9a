//! Entity-to-table metadata.
//!
//! - Declarative entity descriptions ([`Entity`], [`EntitySchema`])
//! - Validated, cached table metadata ([`TableMetadata`])
//! - Startup validation across all entities ([`SchemaValidator`])

pub mod entity;
#[macro_use]
pub mod macros;
pub mod registry;
pub mod validator;

pub use entity::{ColumnBuilder, Entity, EntitySchema, KeyGeneration};
pub use registry::{ColumnMetadata, MetadataError, TableMetadata, table_metadata};
pub use validator::{SchemaValidationError, SchemaValidator};
