use chrono::NaiveDate;
use tempfile::TempDir;

use jobscout_core::config::StoreConfig;
use jobscout_core::models::{Listing, RawListing, Source};
use jobscout_db::Database;

/// Opens a fresh, migrated database under a temp directory.
///
/// The `TempDir` must be kept in scope for the test duration — dropping
/// it deletes the database file.
pub async fn setup_test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig {
        path: dir.path().join("jobs.db").to_string_lossy().into_owned(),
        ..StoreConfig::default()
    };
    let db = Database::connect(&config)
        .await
        .expect("Failed to open database");
    db.migrate().await.expect("Failed to migrate");
    (db, dir)
}

/// A scored listing with its identity derived from the given fields.
pub fn make_listing(title: &str, company: &str, location: &str, score: i32) -> Listing {
    let raw = RawListing::new(title, company, location, Source::Indeed);
    Listing {
        identity: raw.identity(),
        relevance_score: score,
        origin_query: "backend engineer".to_string(),
        origin_location: location.to_string(),
        raw,
    }
}

pub fn day(s: &str) -> NaiveDate {
    s.parse().expect("bad date literal")
}
