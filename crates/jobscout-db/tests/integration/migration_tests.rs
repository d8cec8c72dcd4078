use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use jobscout_core::config::StoreConfig;
use jobscout_db::Database;

use crate::integration::common::{day, make_listing, setup_test_db};

#[tokio::test]
async fn migrate_twice_is_idempotent() {
    let (db, _dir) = setup_test_db().await;
    db.migrate().await.unwrap();
    db.migrate().await.unwrap();
}

#[tokio::test]
async fn migrate_upgrades_an_old_schema_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");

    // A database created by an early build, before the enrichment columns.
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE listings (
            identity TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            location TEXT NOT NULL,
            url TEXT,
            first_seen DATE NOT NULL,
            last_seen DATE NOT NULL,
            relevance_score INTEGER DEFAULT 0,
            applied BOOLEAN DEFAULT FALSE
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        INSERT INTO listings (identity, title, company, location, first_seen, last_seen, relevance_score)
        VALUES ('abc123', 'Old Job', 'Acme', 'Berlin', '2026-07-01', '2026-07-01', 5)
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let config = StoreConfig {
        path: path.to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };
    let db = Database::connect(&config).await.unwrap();
    db.migrate().await.unwrap();

    // Pre-existing rows read back with the added columns empty.
    let repo = db.listings();
    let all = repo.export_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Old Job");
    assert!(all[0].description.is_none());
    assert!(all[0].source.is_empty());

    // And new-format upserts land in the upgraded table.
    let mut listing = make_listing("New Job", "Initech", "Remote", 12);
    listing.raw.description = Some("full description".to_string());
    repo.upsert(&listing, day("2026-08-01")).await.unwrap();
    assert_eq!(repo.export_all().await.unwrap().len(), 2);
}
