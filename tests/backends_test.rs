//! Integration tests against PostgreSQL and MySQL servers.
//!
//! Set TEST_POSTGRES_URL / TEST_MYSQL_URL to run them; they are skipped
//! otherwise.

use chrono::{SubsecRound, Utc};
use tablemap::db::{Database, Session};
use tablemap::error::{DbError, DbResult};
use tablemap::models::{DatabaseType, PaginationParams, SqlValue};
use tablemap::sql::{OrderBy, Params};
use tablemap::{impl_entity, params};

#[derive(Debug, Clone, Default, PartialEq)]
struct Sample {
    id: i64,
    label: String,
    score: Option<f64>,
    seen_at: Option<chrono::DateTime<Utc>>,
}

impl_entity!(Sample,
    table = "tablemap_sample",
    key: id => "id",
    columns {
        label => "label",
        score => "score",
        seen_at => "seen_at",
    }
);

fn ddl(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::PostgreSQL => {
            "CREATE TABLE tablemap_sample (id BIGSERIAL PRIMARY KEY, label TEXT NOT NULL, score DOUBLE PRECISION, seen_at TIMESTAMPTZ)"
        }
        DatabaseType::MySQL => {
            "CREATE TABLE tablemap_sample (id BIGINT AUTO_INCREMENT PRIMARY KEY, label VARCHAR(100) NOT NULL, score DOUBLE, seen_at DATETIME(6))"
        }
        DatabaseType::SQLite => unreachable!("covered by the file-backed tests"),
    }
}

async fn connect(var: &str) -> Option<(Database, Session)> {
    let url = match std::env::var(var) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: {var} not set");
            return None;
        }
    };
    let db = Database::connect_url(&url).await.unwrap();
    let mut session = db.session();
    session
        .execute("DROP TABLE IF EXISTS tablemap_sample", &Params::new())
        .await
        .unwrap();
    session
        .execute(ddl(db.db_type()), &Params::new())
        .await
        .unwrap();
    Some((db, session))
}

async fn exercise(session: &mut Session) {
    let seen_at = Utc::now().trunc_subsecs(6);
    let mut sample = Sample {
        id: 0,
        label: "first".to_string(),
        score: Some(1.5),
        seen_at: Some(seen_at),
    };
    let key = session.insert(&sample).await.unwrap();
    let SqlValue::Int(id) = key else {
        panic!("unexpected key {key:?}");
    };
    sample.id = id;

    let loaded: Sample = session.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded, sample);

    sample.score = None;
    assert_eq!(session.update(&sample).await.unwrap(), 1);
    let loaded: Sample = session.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(loaded.score, None);

    for i in 0..4 {
        let extra = Sample {
            label: format!("extra-{i}"),
            ..Default::default()
        };
        session.insert(&extra).await.unwrap();
    }
    let page = session
        .get_paginated::<Sample>(
            "SELECT * FROM tablemap_sample WHERE label LIKE @prefix",
            PaginationParams::new(2, 3),
            &params! { "prefix" => "extra-%" },
            OrderBy::column("label", false),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].label, "extra-3");

    let result = session
        .with_transaction(async |s| -> DbResult<()> {
            s.delete_by_field::<Sample>("label", "first").await?;
            Err(DbError::internal("abort"))
        })
        .await;
    assert!(result.is_err());
    assert!(session.exists_by_id::<Sample>(id).await.unwrap());

    session
        .execute("DROP TABLE tablemap_sample", &Params::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_postgres_round_trip() {
    let Some((db, mut session)) = connect("TEST_POSTGRES_URL").await else {
        return;
    };
    assert_eq!(db.db_type(), DatabaseType::PostgreSQL);
    exercise(&mut session).await;
    db.close().await;
}

#[tokio::test]
async fn test_mysql_round_trip() {
    let Some((db, mut session)) = connect("TEST_MYSQL_URL").await else {
        return;
    };
    assert_eq!(db.db_type(), DatabaseType::MySQL);
    exercise(&mut session).await;
    db.close().await;
}
