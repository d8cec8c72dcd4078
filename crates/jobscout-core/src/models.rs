use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A listing provider the search API can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Linkedin,
    Indeed,
    Glassdoor,
    Google,
    ZipRecruiter,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Linkedin => "linkedin",
            Source::Indeed => "indeed",
            Source::Glassdoor => "glassdoor",
            Source::Google => "google",
            Source::ZipRecruiter => "zip_recruiter",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linkedin" => Ok(Source::Linkedin),
            "indeed" => Ok(Source::Indeed),
            "glassdoor" => Ok(Source::Glassdoor),
            "google" => Ok(Source::Google),
            "zip_recruiter" | "ziprecruiter" => Ok(Source::ZipRecruiter),
            _ => Err(format!("Unknown source: {}", s)),
        }
    }
}

/// One unit of retrieval work: a single (query, location, source) triple.
///
/// Generated once per run; immutable afterwards. Execution order across
/// workers is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTask {
    pub query: String,
    pub location: String,
    pub source: Source,
}

impl SearchTask {
    pub fn new(query: impl Into<String>, location: impl Into<String>, source: Source) -> Self {
        Self {
            query: query.into(),
            location: location.into(),
            source,
        }
    }
}

impl fmt::Display for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in '{}' on {}", self.query, self.location, self.source)
    }
}

/// A job listing as returned by the retrieval API, before scoring.
///
/// Only `title`, `company`, and `location` are guaranteed; providers are
/// wildly inconsistent about the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub source: Source,
    pub url: Option<String>,
    pub job_type: Option<String>,
    pub is_remote: Option<bool>,
    pub level: Option<String>,
    pub description: Option<String>,
    pub date_posted: Option<NaiveDate>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub currency: Option<String>,
    pub company_url: Option<String>,
}

impl RawListing {
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        source: Source,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            location: location.into(),
            source,
            url: None,
            job_type: None,
            is_remote: None,
            level: None,
            description: None,
            date_posted: None,
            min_salary: None,
            max_salary: None,
            currency: None,
            company_url: None,
        }
    }

    /// Stable identity for this listing; the persistence primary key.
    pub fn identity(&self) -> String {
        listing_identity(&self.title, &self.company, &self.location)
    }
}

/// A deduplicated, scored listing with its originating task recorded.
#[derive(Debug, Clone)]
pub struct Listing {
    pub identity: String,
    pub relevance_score: i32,
    /// The query that produced this listing.
    pub origin_query: String,
    /// The location that produced this listing.
    pub origin_location: String,
    pub raw: RawListing,
}

/// The durable representation of a listing, surviving across runs.
///
/// `first_seen` is immutable after creation and `first_seen <= last_seen`
/// always holds. `source` stays a plain string so records written by older
/// builds with a different provider set remain readable.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedRecord {
    pub identity: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub source: String,
    pub url: Option<String>,
    pub job_type: Option<String>,
    pub is_remote: Option<bool>,
    pub level: Option<String>,
    pub description: Option<String>,
    pub date_posted: Option<NaiveDate>,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub currency: Option<String>,
    pub company_url: Option<String>,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub relevance_score: i32,
    pub applied: bool,
}

/// Aggregate task counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks never dispatched because the run was cancelled first.
    pub skipped: usize,
}

/// What a batch upsert did: rows inserted for the first time versus rows
/// that already existed and were refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub created: u64,
    pub updated: u64,
}

/// Everything a finished run reports to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub tasks: RunStats,
    /// Listings returned by the API across all tasks, duplicates included.
    pub total_found: usize,
    /// Distinct identities after run-local deduplication.
    pub unique: usize,
    /// Unique listings rejected by the fuzzy post-filter.
    pub dropped_by_filter: usize,
    /// Listings at or above the relevance threshold (the persisted set).
    pub relevant: usize,
    pub created: usize,
    pub updated: usize,
    /// Mean relevance score of the persisted set; 0.0 when nothing persisted.
    pub avg_score: f64,
}

/// Counters over the whole store, shown by `jobscout stats` and included
/// in notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub total: i64,
    /// Records with `last_seen` = today.
    pub seen_today: i64,
    /// Records with `first_seen` = today.
    pub new_today: i64,
    pub applied: i64,
    pub avg_score: f64,
}

/// Payload handed to notification channels at the end of a run.
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub run_timestamp: DateTime<Utc>,
    pub total_found: usize,
    pub new_count: usize,
    pub updated_count: usize,
    pub avg_score: f64,
    /// Records first seen today, score-descending. Channels apply their
    /// own score floor and message cap on top.
    pub new_listings: Vec<PersistedRecord>,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive the stable identity for a listing.
///
/// Title, company, and location are trimmed, lowercased, and joined with
/// `|` before hashing, so case and stray-whitespace variants of the same
/// posting collapse to one key regardless of which task or source produced
/// them.
pub fn listing_identity(title: &str, company: &str, location: &str) -> String {
    let canonical = format!(
        "{}|{}|{}",
        title.trim(),
        company.trim(),
        location.trim()
    )
    .to_lowercase();
    compute_hash(&canonical)
}
