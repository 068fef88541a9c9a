//! Integration tests for nested units of work.
//!
//! Tests verify that:
//! - Only the outermost unit of work commits
//! - An error anywhere inside discards every write of the unit
//! - Cancellation rolls the unit back and reports a cancellation error
//! - A unit dropped by a caller-side timeout is rolled back, not joined

use tablemap::catalog::Category;
use tablemap::db::{Database, Session};
use tablemap::error::{DbError, DbResult};
use std::time::Duration;
use tablemap::sql::Params;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

async fn setup() -> (Database, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let db = Database::connect_url(&format!("sqlite:{}", file.path().display()))
        .await
        .unwrap();
    db.session()
        .execute(
            "CREATE TABLE categories (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, slug TEXT NOT NULL UNIQUE, description TEXT)",
            &Params::new(),
        )
        .await
        .unwrap();
    (db, file)
}

fn category(slug: &str) -> Category {
    Category {
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        ..Default::default()
    }
}

async fn count(db: &Database) -> u64 {
    db.session().count_all::<Category>().await.unwrap()
}

#[tokio::test]
async fn test_nested_units_commit_together() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("outer")).await?;
            s.with_transaction(async |s| -> DbResult<()> {
                s.insert(&category("inner")).await?;
                Ok(())
            })
            .await?;
            Ok(())
        })
        .await
        .unwrap();

    assert!(!session.in_transaction());
    assert_eq!(count(&db).await, 2);
}

#[tokio::test]
async fn test_inner_error_rolls_back_outer_writes() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("outer")).await?;
            s.with_transaction(async |s| -> DbResult<()> {
                s.insert(&category("inner")).await?;
                Err(DbError::invalid_input("inner step failed"))
            })
            .await?;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(DbError::InvalidInput { .. })));
    assert!(!session.in_transaction());
    assert_eq!(session.depth(), 0);
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_inner_success_does_not_commit_early() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.with_transaction(async |s| -> DbResult<()> {
                s.insert(&category("inner")).await?;
                Ok(())
            })
            .await?;
            // The inner unit finished, but the outer one still owns the transaction
            assert!(s.in_transaction());
            s.insert(&category("outer")).await?;
            Err(DbError::internal("outer step failed"))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_constraint_failure_rolls_back_unit() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("same")).await?;
            s.insert(&category("same")).await?;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_reads_inside_unit_see_its_writes() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let seen = session
        .with_transaction(async |s| -> DbResult<u64> {
            s.insert(&category("a")).await?;
            s.insert(&category("b")).await?;
            s.count_all::<Category>().await
        })
        .await
        .unwrap();
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn test_session_is_reusable_after_rollback() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let _ = session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("lost")).await?;
            Err(DbError::internal("abort"))
        })
        .await;

    session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("kept")).await?;
            Ok(())
        })
        .await
        .unwrap();

    let kept: Vec<Category> = session.get_all().await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].slug, "kept");
}

#[tokio::test]
async fn test_cancellation_rolls_back() {
    let (db, _file) = setup().await;
    let token = CancellationToken::new();
    let mut session = db.session().with_cancellation(token.clone());

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("first")).await?;
            token.cancel();
            s.insert(&category("second")).await?;
            Ok(())
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert!(!session.in_transaction());
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_cancelled_session_does_not_begin() {
    let (db, _file) = setup().await;
    let token = CancellationToken::new();
    token.cancel();
    let mut session: Session = db.session().with_cancellation(token);

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("never")).await?;
            Ok(())
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(count(&db).await, 0);
}

#[tokio::test]
async fn test_timed_out_unit_is_rolled_back() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(100),
        session.with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("slow")).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!session.in_transaction());
    assert_eq!(session.depth(), 0);
    assert!(session.unit_id().is_none());

    // The abandoned insert is gone before the next statement runs
    assert_eq!(
        session.count_by_field::<Category>("slug", "slow").await.unwrap(),
        0
    );

    session
        .with_transaction(async |s| -> DbResult<()> {
            assert_eq!(s.depth(), 1);
            s.insert(&category("kept")).await?;
            Ok(())
        })
        .await
        .unwrap();

    assert!(!session.in_transaction());
    drop(session);
    assert_eq!(count(&db).await, 1);
    assert_eq!(
        db.session()
            .count_by_field::<Category>("slug", "kept")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_next_unit_after_timeout_commits() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    let _ = tokio::time::timeout(
        Duration::from_millis(100),
        session.with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("slow")).await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }),
    )
    .await;

    // Begins a fresh unit instead of joining the abandoned one
    session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("fresh")).await?;
            Ok(())
        })
        .await
        .unwrap();
    drop(session);

    assert_eq!(count(&db).await, 1);
}

#[tokio::test]
async fn test_timed_out_inner_unit_restores_depth() {
    let (db, _file) = setup().await;
    let mut session = db.session();

    session
        .with_transaction(async |s| -> DbResult<()> {
            s.insert(&category("outer")).await?;
            let inner = tokio::time::timeout(
                Duration::from_millis(100),
                s.with_transaction(async |s| -> DbResult<()> {
                    assert_eq!(s.depth(), 2);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }),
            )
            .await;
            assert!(inner.is_err());
            assert_eq!(s.depth(), 1);
            assert!(s.in_transaction());
            s.insert(&category("after")).await?;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(session.depth(), 0);
    drop(session);
    assert_eq!(count(&db).await, 2);
}
