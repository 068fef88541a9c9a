//! Integration tests for timestamp-guarded updates.
//!
//! Tests verify that:
//! - The first update of a never-modified row succeeds and stamps it
//! - A writer holding a stale timestamp is rejected with the current one
//! - Retrying with the current timestamp succeeds with a later stamp
//! - Missing rows are reported, not treated as conflicts

use tablemap::catalog::Product;
use tablemap::concurrency::UpdateOutcome;
use tablemap::db::{Database, Session};
use tablemap::sql::Params;
use tempfile::NamedTempFile;

async fn setup() -> (Database, Session, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let db = Database::connect_url(&format!("sqlite:{}", file.path().display()))
        .await
        .unwrap();
    let mut session = db.session();
    session
        .execute(
            "CREATE TABLE products (id INTEGER PRIMARY KEY AUTOINCREMENT, subcategory_id INTEGER NOT NULL, name TEXT NOT NULL, price REAL NOT NULL, stock INTEGER NOT NULL, modified_at TIMESTAMP)",
            &Params::new(),
        )
        .await
        .unwrap();
    session
        .insert(&Product {
            subcategory_id: 1,
            name: "Kettle".to_string(),
            price: 20.0,
            stock: 4,
            ..Default::default()
        })
        .await
        .unwrap();
    (db, session, file)
}

async fn load(session: &mut Session) -> Product {
    session.get_by_id::<Product>(1i64).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_first_update_stamps_row() {
    let (_db, mut session, _file) = setup().await;
    let mut product = load(&mut session).await;
    assert_eq!(product.modified_at, None);

    product.price = 25.0;
    let outcome = session.update_if_unmodified(&mut product, None).await.unwrap();
    let UpdateOutcome::Updated { modified_at } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert_eq!(product.modified_at, Some(modified_at));

    let stored = load(&mut session).await;
    assert_eq!(stored.price, 25.0);
    assert_eq!(stored.modified_at, Some(modified_at));
}

#[tokio::test]
async fn test_stale_writer_is_rejected() {
    let (_db, mut session, _file) = setup().await;
    let mut first = load(&mut session).await;
    let mut second = first.clone();

    first.stock = 3;
    let t1 = match session.update_if_unmodified(&mut first, None).await.unwrap() {
        UpdateOutcome::Updated { modified_at } => modified_at,
        other => panic!("unexpected outcome {other:?}"),
    };

    second.stock = 0;
    let outcome = session.update_if_unmodified(&mut second, None).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Conflict { current: Some(t1) });
    // The rejected entity keeps the timestamp it was passed with
    assert_eq!(second.modified_at, None);

    let stored = load(&mut session).await;
    assert_eq!(stored.stock, 3);
}

#[tokio::test]
async fn test_retry_with_current_timestamp_succeeds() {
    let (_db, mut session, _file) = setup().await;
    let mut product = load(&mut session).await;

    let t1 = match session.update_if_unmodified(&mut product, None).await.unwrap() {
        UpdateOutcome::Updated { modified_at } => modified_at,
        other => panic!("unexpected outcome {other:?}"),
    };

    let mut reloaded = load(&mut session).await;
    reloaded.name = "Steel kettle".to_string();
    let t2 = match session
        .update_if_unmodified(&mut reloaded, Some(t1))
        .await
        .unwrap()
    {
        UpdateOutcome::Updated { modified_at } => modified_at,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert!(t2 > t1);
    assert_eq!(load(&mut session).await.name, "Steel kettle");
}

#[tokio::test]
async fn test_missing_row_is_not_found() {
    let (_db, mut session, _file) = setup().await;
    let mut ghost = Product {
        id: 404,
        subcategory_id: 1,
        name: "Ghost".to_string(),
        ..Default::default()
    };

    let outcome = session.update_if_unmodified(&mut ghost, None).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::NotFound);
    assert_eq!(ghost.modified_at, None);
}

#[tokio::test]
async fn test_versioned_update_inside_outer_unit() {
    let (_db, mut session, _file) = setup().await;
    let mut product = load(&mut session).await;

    let outcome = session
        .with_transaction(async |s| -> tablemap::DbResult<UpdateOutcome> {
            product.stock = 10;
            let outcome = s.update_if_unmodified(&mut product, None).await?;
            assert_eq!(s.depth(), 1);
            Ok(outcome)
        })
        .await
        .unwrap();

    assert!(outcome.is_updated());
    assert_eq!(load(&mut session).await.stock, 10);
}
