use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, info};

use jobscout_core::error::AppError;
use jobscout_core::models::{Listing, PersistedRecord, StoreStats, UpsertCounts};
use jobscout_core::scoring::ScoringEngine;

/// SQLite holds 999 bind variables per statement; chunk well under that.
const SQLITE_VAR_LIMIT: usize = 500;

const UPSERT: &str = r#"
    INSERT INTO listings (identity, title, company, location, source,
                          url, job_type, is_remote, level, description,
                          date_posted, min_salary, max_salary, currency, company_url,
                          first_seen, last_seen, relevance_score, applied)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(identity) DO UPDATE SET
        last_seen = excluded.last_seen,
        relevance_score = CASE
            WHEN excluded.relevance_score > listings.relevance_score
            THEN excluded.relevance_score
            ELSE listings.relevance_score
        END,
        source = COALESCE(excluded.source, listings.source),
        url = COALESCE(excluded.url, listings.url),
        job_type = COALESCE(excluded.job_type, listings.job_type),
        is_remote = COALESCE(excluded.is_remote, listings.is_remote),
        level = COALESCE(excluded.level, listings.level),
        description = COALESCE(excluded.description, listings.description),
        date_posted = COALESCE(excluded.date_posted, listings.date_posted),
        min_salary = COALESCE(excluded.min_salary, listings.min_salary),
        max_salary = COALESCE(excluded.max_salary, listings.max_salary),
        currency = COALESCE(excluded.currency, listings.currency),
        company_url = COALESCE(excluded.company_url, listings.company_url)
"#;

const RECORD_COLUMNS: &str = r#"
    identity, title, company, location, source,
    url, job_type, is_remote, level, description,
    date_posted, min_salary, max_salary, currency, company_url,
    first_seen, last_seen, relevance_score, applied
"#;

/// Repository for listing persistence in SQLite.
///
/// Writes run under a store-level async lock so concurrent callers never
/// interleave partial updates; reads go straight to the pool, which WAL
/// mode serves without blocking the writer.
#[derive(Clone)]
pub struct ListingRepository {
    pool: SqlitePool,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Save or update a single listing. Returns `true` if it was new.
    ///
    /// A fresh sighting of a known identity bumps `last_seen`, keeps the
    /// higher relevance score, and fills optional fields the stored record
    /// is missing without erasing ones it already has. `first_seen` and
    /// `applied` are never touched after creation.
    pub async fn upsert(&self, listing: &Listing, today: NaiveDate) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;

        let existed: Option<(String,)> =
            sqlx::query_as("SELECT identity FROM listings WHERE identity = ?")
                .bind(&listing.identity)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        bind_listing(sqlx::query(UPSERT), listing, today)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(existed.is_none())
    }

    /// Upsert a whole batch in one transaction. Returns how many rows were
    /// created versus refreshed.
    pub async fn batch_upsert(
        &self,
        listings: &[Listing],
        today: NaiveDate,
    ) -> Result<UpsertCounts, AppError> {
        if listings.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let _guard = self.write_lock.lock().await;

        let identities: Vec<String> = listings.iter().map(|l| l.identity.clone()).collect();
        let existing = self.ids_present_inner(&identities).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        for listing in listings {
            bind_listing(sqlx::query(UPSERT), listing, today)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let counts = UpsertCounts {
            created: (identities.len() - existing.len()) as u64,
            updated: existing.len() as u64,
        };
        debug!(
            created = counts.created,
            updated = counts.updated,
            "batch upsert committed"
        );
        Ok(counts)
    }

    /// Which of the given identities exist in the store, looked up in
    /// chunks that stay under the bind-variable limit.
    pub async fn ids_present(&self, identities: &[String]) -> Result<HashSet<String>, AppError> {
        self.ids_present_inner(identities).await
    }

    async fn ids_present_inner(
        &self,
        identities: &[String],
    ) -> Result<HashSet<String>, AppError> {
        let mut present = HashSet::new();
        for chunk in identities.chunks(SQLITE_VAR_LIMIT) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql =
                format!("SELECT identity FROM listings WHERE identity IN ({placeholders})");
            let mut query = sqlx::query_scalar::<_, String>(&sql);
            for identity in chunk {
                query = query.bind(identity);
            }
            let found = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
            present.extend(found);
        }
        Ok(present)
    }

    /// All records, most recently seen first, best score first within a day.
    pub async fn export_all(&self) -> Result<Vec<PersistedRecord>, AppError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM listings ORDER BY last_seen DESC, relevance_score DESC"
        );
        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Records first seen on `date`, score-descending.
    pub async fn first_seen_on(&self, date: NaiveDate) -> Result<Vec<PersistedRecord>, AppError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM listings WHERE first_seen = ? ORDER BY relevance_score DESC"
        );
        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark a record as applied-to. Returns `false` if the identity is
    /// unknown.
    pub async fn mark_applied(&self, identity: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE listings SET applied = TRUE WHERE identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-apply the current scoring configuration to every stored record.
    /// Only rows whose score actually changes are rewritten; returns that
    /// count.
    pub async fn recalculate_scores(&self, engine: &ScoringEngine) -> Result<u64, AppError> {
        let records = self.export_all().await?;
        if records.is_empty() {
            return Ok(0);
        }

        let updates: Vec<(String, i32)> = records
            .iter()
            .filter_map(|record| {
                let score = engine.score_record(record);
                (score != record.relevance_score).then(|| (record.identity.clone(), score))
            })
            .collect();
        if updates.is_empty() {
            info!(total = records.len(), "scores already current");
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        for (identity, score) in &updates {
            sqlx::query("UPDATE listings SET relevance_score = ? WHERE identity = ?")
                .bind(score)
                .bind(identity)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        info!(
            total = records.len(),
            updated = updates.len(),
            "recalculated relevance scores"
        );
        Ok(updates.len() as u64)
    }

    /// Delete records not seen for more than `days` days. Returns the
    /// number removed.
    pub async fn cleanup(&self, days: u32) -> Result<u64, AppError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM listings WHERE last_seen < date('now', ?)")
            .bind(format!("-{days} days"))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Aggregate counters over the whole store.
    pub async fn statistics(&self, today: NaiveDate) -> Result<StoreStats, AppError> {
        let row: (i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE last_seen = ?),
                   COUNT(*) FILTER (WHERE first_seen = ?),
                   COUNT(*) FILTER (WHERE applied),
                   AVG(relevance_score)
            FROM listings
            "#,
        )
        .bind(today)
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(StoreStats {
            total: row.0,
            seen_today: row.1,
            new_today: row.2,
            applied: row.3,
            avg_score: row.4.unwrap_or(0.0),
        })
    }
}

fn bind_listing<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    listing: &'q Listing,
    today: NaiveDate,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&listing.identity)
        .bind(&listing.raw.title)
        .bind(&listing.raw.company)
        .bind(&listing.raw.location)
        .bind(listing.raw.source.as_str())
        .bind(&listing.raw.url)
        .bind(&listing.raw.job_type)
        .bind(listing.raw.is_remote)
        .bind(&listing.raw.level)
        .bind(&listing.raw.description)
        .bind(listing.raw.date_posted)
        .bind(listing.raw.min_salary)
        .bind(listing.raw.max_salary)
        .bind(&listing.raw.currency)
        .bind(&listing.raw.company_url)
        .bind(today)
        .bind(today)
        .bind(listing.relevance_score)
        .bind(false)
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ListingRow {
    identity: String,
    title: String,
    company: String,
    location: String,
    source: Option<String>,
    url: Option<String>,
    job_type: Option<String>,
    is_remote: Option<bool>,
    level: Option<String>,
    description: Option<String>,
    date_posted: Option<NaiveDate>,
    min_salary: Option<f64>,
    max_salary: Option<f64>,
    currency: Option<String>,
    company_url: Option<String>,
    first_seen: NaiveDate,
    last_seen: NaiveDate,
    relevance_score: i32,
    applied: bool,
}

impl From<ListingRow> for PersistedRecord {
    fn from(row: ListingRow) -> Self {
        PersistedRecord {
            identity: row.identity,
            title: row.title,
            company: row.company,
            location: row.location,
            source: row.source.unwrap_or_default(),
            url: row.url,
            job_type: row.job_type,
            is_remote: row.is_remote,
            level: row.level,
            description: row.description,
            date_posted: row.date_posted,
            min_salary: row.min_salary,
            max_salary: row.max_salary,
            currency: row.currency,
            company_url: row.company_url,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            relevance_score: row.relevance_score,
            applied: row.applied,
        }
    }
}

// -- Trait implementation --

impl jobscout_core::traits::ListingStore for ListingRepository {
    async fn batch_upsert(
        &self,
        listings: &[Listing],
        today: NaiveDate,
    ) -> Result<UpsertCounts, AppError> {
        ListingRepository::batch_upsert(self, listings, today).await
    }

    async fn ids_present(&self, identities: &[String]) -> Result<HashSet<String>, AppError> {
        ListingRepository::ids_present(self, identities).await
    }

    async fn first_seen_on(&self, date: NaiveDate) -> Result<Vec<PersistedRecord>, AppError> {
        ListingRepository::first_seen_on(self, date).await
    }
}
