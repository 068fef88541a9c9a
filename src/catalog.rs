//! A small product catalog built on the data-access layer.
//!
//! Categories contain subcategories, which contain products. Category slugs
//! are unique; the unique constraint on `categories.slug` is what guarantees
//! it, the existence check only reports the common case earlier. Products
//! are edited with optimistic concurrency on `modified_at`.

use crate::concurrency::{UpdateOutcome, Versioned};
use crate::db::Session;
use crate::error::DbError;
use crate::metadata::SchemaValidator;
use crate::models::{FromSqlValue, PaginatedResult, PaginationParams, SqlValue};
use crate::sql::{OrderBy, Params, TrustedExpression};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl_entity!(Category,
    table = "categories",
    key: id => "id",
    columns {
        name => "name",
        slug => "slug",
        description => "description",
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subcategory {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
}

impl_entity!(Subcategory,
    table = "subcategories",
    key: id => "id",
    columns {
        category_id => "category_id",
        name => "name",
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub subcategory_id: i64,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl_entity!(Product,
    table = "products",
    key: id => "id",
    columns {
        subcategory_id => "subcategory_id",
        name => "name",
        price => "price",
        stock => "stock",
        modified_at => "modified_at",
    }
);

impl Versioned for Product {
    const MODIFIED_AT_COLUMN: &'static str = "modified_at";

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    fn set_modified_at(&mut self, modified_at: Option<DateTime<Utc>>) {
        self.modified_at = modified_at;
    }
}

/// Validator covering every catalog entity; run it at startup.
pub fn schema() -> SchemaValidator {
    let mut validator = SchemaValidator::new();
    validator
        .register::<Category>()
        .register::<Subcategory>()
        .register::<Product>();
    validator
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Slug '{slug}' is already in use")]
    SlugTaken { slug: String },

    #[error("{entity} {id} was modified by someone else")]
    Conflict {
        entity: &'static str,
        id: i64,
        current: Option<DateTime<Utc>>,
    },

    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Unknown sort key '{key}'. Use one of: {}", SORT_KEYS.join(", "))]
    UnknownSort { key: String },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Sort keys accepted from callers and the ordering each one stands for.
const SORT_ORDERS: &[(&str, &str)] = &[
    ("name", "name ASC, id ASC"),
    ("price_asc", "price ASC, id ASC"),
    ("price_desc", "price DESC, id ASC"),
    ("newest", "id DESC"),
];

const SORT_KEYS: [&str; 4] = ["name", "price_asc", "price_desc", "newest"];

fn sort_order(key: Option<&str>) -> Result<OrderBy, CatalogError> {
    let Some(key) = key else {
        return Ok(OrderBy::Default);
    };
    let (_, sql) = SORT_ORDERS
        .iter()
        .find(|(name, _)| *name == key)
        .ok_or_else(|| CatalogError::UnknownSort {
            key: key.to_string(),
        })?;
    let expression = TrustedExpression::create(sql).map_err(DbError::from)?;
    Ok(OrderBy::trusted(expression))
}

fn key_to_id(key: SqlValue) -> Result<i64, CatalogError> {
    Ok(i64::from_sql_value(key)?)
}

/// Catalog operations. Every method takes the caller's session so several
/// calls can share one unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogService;

impl CatalogService {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_category(
        &self,
        session: &mut Session,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Category, CatalogError> {
        let mut category = Category {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.map(str::to_string),
        };

        let id = session
            .with_transaction(async |s| -> Result<i64, CatalogError> {
                if s.exists_by_field::<Category>("slug", slug).await? {
                    return Err(CatalogError::SlugTaken {
                        slug: slug.to_string(),
                    });
                }
                match s.insert(&category).await {
                    Ok(key) => key_to_id(key),
                    Err(DbError::UniqueViolation { .. }) => Err(CatalogError::SlugTaken {
                        slug: slug.to_string(),
                    }),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        category.id = id;
        info!(category_id = id, slug = %slug, "Category created");
        Ok(category)
    }

    pub async fn create_subcategory(
        &self,
        session: &mut Session,
        category_id: i64,
        name: &str,
    ) -> Result<Subcategory, CatalogError> {
        let mut subcategory = Subcategory {
            id: 0,
            category_id,
            name: name.to_string(),
        };

        let id = session
            .with_transaction(async |s| -> Result<i64, CatalogError> {
                if !s.exists_by_id::<Category>(category_id).await? {
                    return Err(CatalogError::NotFound {
                        entity: "Category",
                        id: category_id,
                    });
                }
                key_to_id(s.insert(&subcategory).await?)
            })
            .await?;

        subcategory.id = id;
        Ok(subcategory)
    }

    pub async fn create_product(
        &self,
        session: &mut Session,
        subcategory_id: i64,
        name: &str,
        price: f64,
        stock: i64,
    ) -> Result<Product, CatalogError> {
        let mut product = Product {
            id: 0,
            subcategory_id,
            name: name.to_string(),
            price,
            stock,
            modified_at: None,
        };
        product.id = key_to_id(session.insert(&product).await?)?;
        Ok(product)
    }

    pub async fn product(&self, session: &mut Session, id: i64) -> Result<Product, CatalogError> {
        session
            .get_by_id::<Product>(id)
            .await?
            .ok_or(CatalogError::NotFound {
                entity: "Product",
                id,
            })
    }

    /// Save `product`, provided nobody changed it since `last_seen`.
    ///
    /// Returns the new modification timestamp, which is also stored in
    /// `product`.
    pub async fn update_product(
        &self,
        session: &mut Session,
        product: &mut Product,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, CatalogError> {
        match session.update_if_unmodified(product, last_seen).await? {
            UpdateOutcome::Updated { modified_at } => Ok(modified_at),
            UpdateOutcome::Conflict { current } => Err(CatalogError::Conflict {
                entity: "Product",
                id: product.id,
                current,
            }),
            UpdateOutcome::NotFound => Err(CatalogError::NotFound {
                entity: "Product",
                id: product.id,
            }),
        }
    }

    /// Products in any of `subcategory_ids`, one page at a time.
    ///
    /// `sort` is one of the public sort keys (`name`, `price_asc`,
    /// `price_desc`, `newest`); `None` orders by id.
    pub async fn list_products(
        &self,
        session: &mut Session,
        subcategory_ids: &[i64],
        sort: Option<&str>,
        pagination: PaginationParams,
    ) -> Result<PaginatedResult<Product>, CatalogError> {
        let order = sort_order(sort)?;
        pagination.validate()?;
        if subcategory_ids.is_empty() {
            return Ok(PaginatedResult::empty(0, pagination));
        }

        let mut params = Params::new();
        let placeholders: Vec<String> = subcategory_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let name = format!("sub_{i}");
                params.bind(name.as_str(), *id);
                format!("@{name}")
            })
            .collect();
        let base = format!(
            "SELECT id, subcategory_id, name, price, stock, modified_at FROM products \
             WHERE subcategory_id IN ({})",
            placeholders.join(", ")
        );

        Ok(session
            .get_paginated::<Product>(&base, pagination, &params, order)
            .await?)
    }

    /// Delete the subcategories and every product in them as one unit.
    ///
    /// Returns the number of subcategories removed.
    pub async fn remove_subcategories(
        &self,
        session: &mut Session,
        ids: &[i64],
    ) -> Result<u64, CatalogError> {
        session
            .with_transaction(async |s| -> Result<u64, CatalogError> {
                let products = s
                    .delete_where_in::<Product, _>("subcategory_id", ids.iter().copied())
                    .await?;
                let removed = s
                    .delete_where_in::<Subcategory, _>("id", ids.iter().copied())
                    .await?;
                info!(subcategories = removed, products, "Subcategories removed");
                Ok(removed)
            })
            .await
    }

    /// Delete a category together with its subcategories and their products.
    pub async fn remove_category(&self, session: &mut Session, id: i64) -> Result<(), CatalogError> {
        session
            .with_transaction(async |s| -> Result<(), CatalogError> {
                let subcategory_ids: Vec<i64> = s
                    .get_by_field::<Subcategory>("category_id", id)
                    .await?
                    .into_iter()
                    .map(|sub| sub.id)
                    .collect();
                self.remove_subcategories(s, &subcategory_ids).await?;
                if s.delete_by_id::<Category>(id).await? == 0 {
                    return Err(CatalogError::NotFound {
                        entity: "Category",
                        id,
                    });
                }
                Ok(())
            })
            .await
    }
}
