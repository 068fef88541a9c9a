//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate database-specific
//! implementations while maintaining linear readability. The macros expand
//! at compile time with zero runtime overhead.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbPool` variants, reducing the need
/// to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Same as [`impl_db_dispatch!`] for an open `DbTransaction`.
///
/// ```ignore
/// impl_tx_dispatch!(tx, {
///     MySql(t) => mysql::execute(&mut **t, &stmt).await,
///     Postgres(t) => postgres::execute(&mut **t, &stmt).await,
///     SQLite(t) => sqlite::execute(&mut **t, &stmt).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_tx_dispatch {
    ($tx:expr, { $($variant:ident($t:ident) => $body:expr),+ $(,)? }) => {
        match $tx {
            $(
                $crate::db::transaction::DbTransaction::$variant($t) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
pub use impl_tx_dispatch;
