//! tablemap library
//!
//! A metadata-driven data-access layer for SQL databases (SQLite, PostgreSQL,
//! MySQL): entities describe their table once, and the library generates
//! parameterised CRUD, paginated reads and nested units of work from that
//! description.

#[macro_use]
pub mod metadata;
#[macro_use]
pub mod sql;
#[macro_use]
pub mod db;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod models;

pub use concurrency::{UpdateOutcome, Versioned};
pub use config::{Config, DatabaseConfig};
pub use db::{Database, Record, Session};
pub use error::{DbError, DbResult};
pub use metadata::{Entity, SchemaValidator, TableMetadata, table_metadata};
pub use models::{PaginatedResult, PaginationParams, SqlValue};
pub use sql::{OrderBy, Params, Statement, TrustedExpression};
