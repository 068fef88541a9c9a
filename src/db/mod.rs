//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Sessions, units of work and cancellation
//! - Statement execution and row decoding
//! - Entity queries, commands and pagination
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod commands;
pub mod executor;
pub mod paginator;
pub(crate) mod params;
pub mod pool;
pub mod queries;
pub mod session;
pub mod transaction;
pub mod types;

pub use executor::ExecResult;
pub use pool::{Database, DbPool};
pub use session::Session;
pub use transaction::DbTransaction;
pub use types::{Record, RowToRecord, TypeCategory, categorize_type};
