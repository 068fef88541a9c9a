//! Data models shared across the crate.
//!
//! This module re-exports all model types used throughout the library.

pub mod connection;
pub mod page;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionInfo, DatabaseType};
pub use page::{DEFAULT_PAGE_SIZE, PaginatedResult, PaginationParams};
pub use value::{FromSqlValue, SqlType, SqlValue, ValueKind};
