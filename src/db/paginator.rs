//! Paginated reads over a bespoke base query.

use crate::db::session::Session;
use crate::error::DbResult;
use crate::metadata::{Entity, table_metadata};
use crate::models::{PaginatedResult, PaginationParams};
use crate::sql::{OrderBy, PageStatements, Params, validate_query};
use tracing::debug;

impl Session {
    /// One page of `T` selected by `base_query`.
    ///
    /// The base query must be a single read-only SELECT without its own
    /// ORDER BY or window. The total row count and the page itself are read
    /// in the same unit of work so they describe one snapshot. When the
    /// count is zero the page query is skipped.
    ///
    /// ```ignore
    /// let page = session
    ///     .get_paginated::<Product>(
    ///         "SELECT * FROM products WHERE subcategory_id = @sub",
    ///         PaginationParams::new(2, 20),
    ///         &params! { "sub" => 4i64 },
    ///         OrderBy::column("name", false),
    ///     )
    ///     .await?;
    /// ```
    pub async fn get_paginated<T: Entity>(
        &mut self,
        base_query: &str,
        pagination: PaginationParams,
        params: &Params,
        order: OrderBy,
    ) -> DbResult<PaginatedResult<T>> {
        pagination.validate()?;
        validate_query(base_query, self.db_type())?;
        let statements = self
            .generator::<T>()?
            .paginate(base_query, pagination, params, &order)?;

        self.with_transaction(async move |s| read_page::<T>(s, statements, pagination).await)
            .await
    }
}

async fn read_page<T: Entity>(
    session: &mut Session,
    statements: PageStatements,
    pagination: PaginationParams,
) -> DbResult<PaginatedResult<T>> {
    let total = session.fetch_count(&statements.count).await?;
    if total == 0 {
        debug!(page = pagination.page, "Empty result set, skipping page query");
        return Ok(PaginatedResult::empty(0, pagination));
    }

    let metadata = table_metadata::<T>()?;
    let items = session
        .fetch_records(&statements.page)
        .await?
        .into_iter()
        .map(|record| metadata.materialize(record))
        .collect::<DbResult<Vec<T>>>()?;

    debug!(
        page = pagination.page,
        page_size = pagination.page_size,
        total,
        returned = items.len(),
        "Page read"
    );
    Ok(PaginatedResult::new(items, total, pagination))
}
