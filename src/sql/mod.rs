//! SQL text generation.
//!
//! This module turns table metadata into parameterised statements:
//! - Named-parameter statements and their backend compilation
//! - Dialect quoting, windowing and identity retrieval
//! - Entity CRUD, count, exists and pagination statements
//! - Trusted verbatim fragments and the read-only guard for bespoke SQL

#[macro_use]
pub mod statement;
pub mod dialect;
pub mod generator;
pub mod guard;
pub mod order;
pub mod trusted;

pub use dialect::{Dialect, IdentityStrategy};
pub use generator::{InsertKey, InsertStatement, PageStatements, SqlGenerator};
pub use guard::validate_query;
pub use order::OrderBy;
pub use statement::{CompiledStatement, Params, Statement};
pub use trusted::{TrustedExpression, TrustedExpressionError};
