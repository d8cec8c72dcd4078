use std::collections::BTreeMap;

use chrono::{Duration, Utc};

use jobscout_core::config::{CategoryConfig, ScoringConfig};
use jobscout_core::scoring::ScoringEngine;

use crate::integration::common::{day, make_listing, setup_test_db};

#[tokio::test]
async fn upsert_creates_then_updates() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    let listing = make_listing("Backend Engineer", "Acme", "Berlin", 20);

    let is_new = repo.upsert(&listing, day("2026-08-01")).await.unwrap();
    assert!(is_new);

    let is_new = repo.upsert(&listing, day("2026-08-02")).await.unwrap();
    assert!(!is_new);

    let all = repo.export_all().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn repeated_upsert_keeps_first_seen_and_advances_last_seen() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    let listing = make_listing("Backend Engineer", "Acme", "Berlin", 20);

    repo.upsert(&listing, day("2026-08-01")).await.unwrap();
    repo.upsert(&listing, day("2026-08-05")).await.unwrap();

    let record = &repo.export_all().await.unwrap()[0];
    assert_eq!(record.first_seen, day("2026-08-01"));
    assert_eq!(record.last_seen, day("2026-08-05"));
}

#[tokio::test]
async fn relevance_score_never_decreases() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    let mut listing = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    repo.upsert(&listing, day("2026-08-01")).await.unwrap();

    listing.relevance_score = 5;
    repo.upsert(&listing, day("2026-08-02")).await.unwrap();
    assert_eq!(repo.export_all().await.unwrap()[0].relevance_score, 20);

    listing.relevance_score = 25;
    repo.upsert(&listing, day("2026-08-03")).await.unwrap();
    assert_eq!(repo.export_all().await.unwrap()[0].relevance_score, 25);
}

#[tokio::test]
async fn merge_fills_gaps_without_erasing() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    // Run 1 sees a full record.
    let mut first = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    first.raw.description = Some("short".to_string());
    repo.upsert(&first, day("2026-08-01")).await.unwrap();

    // Run 2 sees the same posting, truncated, but with a URL this time.
    let mut second = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    second.raw.description = None;
    second.raw.url = Some("https://jobs.example/1".to_string());
    repo.upsert(&second, day("2026-08-02")).await.unwrap();

    let record = &repo.export_all().await.unwrap()[0];
    assert_eq!(record.description.as_deref(), Some("short"));
    assert_eq!(record.url.as_deref(), Some("https://jobs.example/1"));
    assert_eq!(record.last_seen, day("2026-08-02"));
}

#[tokio::test]
async fn applied_flag_survives_upsert() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    let listing = make_listing("Backend Engineer", "Acme", "Berlin", 20);

    repo.upsert(&listing, day("2026-08-01")).await.unwrap();
    assert!(repo.mark_applied(&listing.identity).await.unwrap());

    repo.upsert(&listing, day("2026-08-02")).await.unwrap();
    assert!(repo.export_all().await.unwrap()[0].applied);
}

#[tokio::test]
async fn mark_applied_unknown_identity_returns_false() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    assert!(!repo.mark_applied("no-such-identity").await.unwrap());
}

#[tokio::test]
async fn batch_upsert_reports_created_and_updated() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    let known = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    repo.upsert(&known, day("2026-08-01")).await.unwrap();

    let batch = vec![
        known.clone(),
        make_listing("Data Engineer", "Initech", "Berlin", 15),
        make_listing("Platform Engineer", "Globex", "Remote", 30),
    ];
    let counts = repo.batch_upsert(&batch, day("2026-08-02")).await.unwrap();

    assert_eq!(counts.created, 2);
    assert_eq!(counts.updated, 1);
    assert_eq!(repo.export_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn batch_upsert_of_nothing_is_a_noop() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    let counts = repo.batch_upsert(&[], day("2026-08-01")).await.unwrap();
    assert_eq!((counts.created, counts.updated), (0, 0));
}

#[tokio::test]
async fn ids_present_batches_past_the_variable_limit() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    // 750 known identities forces the lookup across two chunks of 500.
    let batch: Vec<_> = (0..750)
        .map(|i| make_listing(&format!("Engineer {i}"), "Acme", "Berlin", 10))
        .collect();
    repo.batch_upsert(&batch, day("2026-08-01")).await.unwrap();

    let mut probe: Vec<String> = batch.iter().map(|l| l.identity.clone()).collect();
    probe.extend((0..750).map(|i| format!("unknown-{i}")));
    assert_eq!(probe.len(), 1500);

    let present = repo.ids_present(&probe).await.unwrap();
    assert_eq!(present.len(), 750);
    assert!(batch.iter().all(|l| present.contains(&l.identity)));
}

#[tokio::test]
async fn cleanup_removes_only_stale_records() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    let today = Utc::now().date_naive();

    let stale = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    repo.upsert(&stale, today - Duration::days(31)).await.unwrap();
    let fresh = make_listing("Data Engineer", "Initech", "Berlin", 15);
    repo.upsert(&fresh, today - Duration::days(5)).await.unwrap();

    let removed = repo.cleanup(30).await.unwrap();
    assert_eq!(removed, 1);

    let all = repo.export_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].identity, fresh.identity);
}

#[tokio::test]
async fn first_seen_on_returns_new_records_best_first() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    let old = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    repo.upsert(&old, day("2026-08-01")).await.unwrap();
    repo.upsert(&make_listing("Data Engineer", "Initech", "Berlin", 15), day("2026-08-02"))
        .await
        .unwrap();
    repo.upsert(&make_listing("Platform Engineer", "Globex", "Remote", 30), day("2026-08-02"))
        .await
        .unwrap();
    // A repeat sighting does not make a record new again.
    repo.upsert(&old, day("2026-08-02")).await.unwrap();

    let new_records = repo.first_seen_on(day("2026-08-02")).await.unwrap();
    assert_eq!(new_records.len(), 2);
    assert_eq!(new_records[0].relevance_score, 30);
    assert_eq!(new_records[1].relevance_score, 15);
}

#[tokio::test]
async fn export_orders_by_recency_then_score() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    repo.upsert(&make_listing("Backend Engineer", "Acme", "Berlin", 30), day("2026-08-01"))
        .await
        .unwrap();
    repo.upsert(&make_listing("Data Engineer", "Initech", "Berlin", 10), day("2026-08-02"))
        .await
        .unwrap();
    repo.upsert(&make_listing("Platform Engineer", "Globex", "Remote", 20), day("2026-08-02"))
        .await
        .unwrap();

    let all = repo.export_all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].relevance_score, 20);
    assert_eq!(all[1].relevance_score, 10);
    assert_eq!(all[2].relevance_score, 30);
}

#[tokio::test]
async fn statistics_reflect_the_store() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();
    let today = day("2026-08-02");

    let old = make_listing("Backend Engineer", "Acme", "Berlin", 20);
    repo.upsert(&old, day("2026-08-01")).await.unwrap();
    repo.upsert(&old, today).await.unwrap();
    repo.upsert(&make_listing("Data Engineer", "Initech", "Berlin", 10), today)
        .await
        .unwrap();
    repo.mark_applied(&old.identity).await.unwrap();

    let stats = repo.statistics(today).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.seen_today, 2);
    assert_eq!(stats.new_today, 1);
    assert_eq!(stats.applied, 1);
    assert!((stats.avg_score - 15.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn recalculate_rescoring_updates_only_changed_rows() {
    let (db, _dir) = setup_test_db().await;
    let repo = db.listings();

    repo.upsert(&make_listing("Rust Developer", "Acme", "Berlin", 0), day("2026-08-01"))
        .await
        .unwrap();
    repo.upsert(&make_listing("Accountant", "Initech", "Berlin", 0), day("2026-08-01"))
        .await
        .unwrap();

    let config = ScoringConfig {
        threshold: 10,
        categories: BTreeMap::from([(
            "languages".to_string(),
            CategoryConfig {
                weight: 10,
                keywords: vec!["rust".to_string()],
            },
        )]),
    };
    let engine = ScoringEngine::new(&config);

    let updated = repo.recalculate_scores(&engine).await.unwrap();
    assert_eq!(updated, 1);

    let all = repo.export_all().await.unwrap();
    let rust_job = all.iter().find(|r| r.title == "Rust Developer").unwrap();
    assert_eq!(rust_job.relevance_score, 10);

    // A second pass finds nothing to change.
    assert_eq!(repo.recalculate_scores(&engine).await.unwrap(), 0);
}
