//! End-to-end tests for the catalog service.
//!
//! Tests verify that:
//! - Category slugs stay unique
//! - Product edits are guarded by their modification timestamp
//! - Product listings honour the public sort keys across subcategories
//! - Removing a category cascades in one unit of work

use tablemap::catalog::{CatalogError, CatalogService, Category, Product, Subcategory};
use tablemap::db::{Database, Session};
use tablemap::models::PaginationParams;
use tablemap::sql::Params;
use tempfile::NamedTempFile;

const SCHEMA: &[&str] = &[
    "CREATE TABLE categories (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, slug TEXT NOT NULL UNIQUE, description TEXT)",
    "CREATE TABLE subcategories (id INTEGER PRIMARY KEY AUTOINCREMENT, category_id INTEGER NOT NULL REFERENCES categories(id), name TEXT NOT NULL)",
    "CREATE TABLE products (id INTEGER PRIMARY KEY AUTOINCREMENT, subcategory_id INTEGER NOT NULL REFERENCES subcategories(id), name TEXT NOT NULL, price REAL NOT NULL, stock INTEGER NOT NULL, modified_at TIMESTAMP)",
];

async fn setup() -> (Database, Session, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let db = Database::connect_url(&format!("sqlite:{}", file.path().display()))
        .await
        .unwrap();
    let mut session = db.session();
    for ddl in SCHEMA {
        session.execute(ddl, &Params::new()).await.unwrap();
    }
    (db, session, file)
}

/// One category with two subcategories: kettles (3 products) and pans (2).
async fn seed(catalog: &CatalogService, session: &mut Session) -> (Category, Subcategory, Subcategory) {
    let kitchen = catalog
        .create_category(session, "Kitchen", "kitchen", Some("Cooking gear"))
        .await
        .unwrap();
    let kettles = catalog
        .create_subcategory(session, kitchen.id, "Kettles")
        .await
        .unwrap();
    let pans = catalog
        .create_subcategory(session, kitchen.id, "Pans")
        .await
        .unwrap();

    for (name, price) in [("Copper kettle", 45.0), ("Glass kettle", 30.0), ("Travel kettle", 12.5)] {
        catalog
            .create_product(session, kettles.id, name, price, 5)
            .await
            .unwrap();
    }
    for (name, price) in [("Wok", 38.0), ("Skillet", 22.0)] {
        catalog
            .create_product(session, pans.id, name, price, 2)
            .await
            .unwrap();
    }
    (kitchen, kettles, pans)
}

#[tokio::test]
async fn test_create_category_assigns_id() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();

    let category = catalog
        .create_category(&mut session, "Garden", "garden", None)
        .await
        .unwrap();
    assert!(category.id > 0);

    let stored: Category = session.get_by_id(category.id).await.unwrap().unwrap();
    assert_eq!(stored, category);
}

#[tokio::test]
async fn test_duplicate_slug_is_rejected() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();

    catalog
        .create_category(&mut session, "Garden", "garden", None)
        .await
        .unwrap();
    let err = catalog
        .create_category(&mut session, "Garden again", "garden", None)
        .await
        .unwrap_err();

    match err {
        CatalogError::SlugTaken { slug } => assert_eq!(slug, "garden"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.count_all::<Category>().await.unwrap(), 1);
}

#[tokio::test]
async fn test_subcategory_requires_category() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();

    let err = catalog
        .create_subcategory(&mut session, 77, "Orphans")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::NotFound {
            entity: "Category",
            id: 77
        }
    ));
    assert_eq!(session.count_all::<Subcategory>().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_product_detects_conflict() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (_, kettles, _) = seed(&catalog, &mut session).await;

    let product = catalog
        .create_product(&mut session, kettles.id, "Stovetop kettle", 18.0, 1)
        .await
        .unwrap();

    let mut alice = catalog.product(&mut session, product.id).await.unwrap();
    let mut bob = alice.clone();

    alice.price = 16.0;
    let stamp = catalog
        .update_product(&mut session, &mut alice, None)
        .await
        .unwrap();

    bob.stock = 0;
    let err = catalog
        .update_product(&mut session, &mut bob, None)
        .await
        .unwrap_err();
    match err {
        CatalogError::Conflict { entity, id, current } => {
            assert_eq!(entity, "Product");
            assert_eq!(id, product.id);
            assert_eq!(current, Some(stamp));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = catalog.product(&mut session, product.id).await.unwrap();
    assert_eq!(stored.price, 16.0);
    assert_eq!(stored.stock, 1);
}

#[tokio::test]
async fn test_update_missing_product() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let mut ghost = Product {
        id: 9,
        name: "Ghost".to_string(),
        ..Default::default()
    };

    let err = catalog
        .update_product(&mut session, &mut ghost, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { entity: "Product", id: 9 }));
    assert!(matches!(
        catalog.product(&mut session, 9).await.unwrap_err(),
        CatalogError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_list_products_sorted_by_price() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (_, kettles, pans) = seed(&catalog, &mut session).await;

    let page = catalog
        .list_products(
            &mut session,
            &[kettles.id, pans.id],
            Some("price_desc"),
            PaginationParams::new(1, 3),
        )
        .await
        .unwrap();

    assert_eq!(page.total_count, 5);
    let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Copper kettle", "Wok", "Glass kettle"]);

    let page = catalog
        .list_products(
            &mut session,
            &[kettles.id, pans.id],
            Some("price_desc"),
            PaginationParams::new(2, 3),
        )
        .await
        .unwrap();
    let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Skillet", "Travel kettle"]);
}

#[tokio::test]
async fn test_list_products_other_sort_keys() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (_, _, pans) = seed(&catalog, &mut session).await;

    let by_name = catalog
        .list_products(&mut session, &[pans.id], Some("name"), PaginationParams::default())
        .await
        .unwrap();
    let names: Vec<&str> = by_name.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Skillet", "Wok"]);

    let newest = catalog
        .list_products(&mut session, &[pans.id], Some("newest"), PaginationParams::default())
        .await
        .unwrap();
    let ids: Vec<i64> = newest.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![5, 4]);

    let unsorted = catalog
        .list_products(&mut session, &[pans.id], None, PaginationParams::default())
        .await
        .unwrap();
    let ids: Vec<i64> = unsorted.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![4, 5]);
}

#[tokio::test]
async fn test_list_products_rejects_unknown_sort() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (_, kettles, _) = seed(&catalog, &mut session).await;

    let err = catalog
        .list_products(
            &mut session,
            &[kettles.id],
            Some("price DESC; DROP TABLE products"),
            PaginationParams::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownSort { .. }));
    assert_eq!(session.count_all::<Product>().await.unwrap(), 5);
}

#[tokio::test]
async fn test_list_products_without_subcategories() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();

    let page = catalog
        .list_products(&mut session, &[], Some("name"), PaginationParams::default())
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_remove_category_cascades() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (kitchen, _, _) = seed(&catalog, &mut session).await;
    let garden = catalog
        .create_category(&mut session, "Garden", "garden", None)
        .await
        .unwrap();
    let hoses = catalog
        .create_subcategory(&mut session, garden.id, "Hoses")
        .await
        .unwrap();
    catalog
        .create_product(&mut session, hoses.id, "Hose", 9.0, 8)
        .await
        .unwrap();

    catalog.remove_category(&mut session, kitchen.id).await.unwrap();

    assert!(!session.exists_by_id::<Category>(kitchen.id).await.unwrap());
    assert_eq!(session.count_all::<Category>().await.unwrap(), 1);
    assert_eq!(session.count_all::<Subcategory>().await.unwrap(), 1);
    assert_eq!(session.count_all::<Product>().await.unwrap(), 1);
}

#[tokio::test]
async fn test_remove_missing_category_changes_nothing() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    seed(&catalog, &mut session).await;

    let err = catalog.remove_category(&mut session, 999).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { entity: "Category", id: 999 }));
    assert_eq!(session.count_all::<Product>().await.unwrap(), 5);
}

#[tokio::test]
async fn test_remove_subcategories_returns_count() {
    let (_db, mut session, _file) = setup().await;
    let catalog = CatalogService::new();
    let (kitchen, kettles, _) = seed(&catalog, &mut session).await;

    let removed = catalog
        .remove_subcategories(&mut session, &[kettles.id, 404])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(session.count_all::<Product>().await.unwrap(), 2);
    assert_eq!(
        session
            .count_by_field::<Subcategory>("category_id", kitchen.id)
            .await
            .unwrap(),
        1
    );
}
