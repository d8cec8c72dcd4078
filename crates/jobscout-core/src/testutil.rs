//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::config::FetchConfig;
use crate::error::AppError;
use crate::models::{Listing, PersistedRecord, RawListing, SearchTask, Source, UpsertCounts};
use crate::traits::{JobSource, ListingStore};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock source that pops scripted responses in call order.
///
/// An exhausted queue answers with an empty listing page, so tests only
/// script the calls they care about.
#[derive(Clone)]
pub struct MockSource {
    responses: Arc<Mutex<Vec<Result<Vec<RawListing>, AppError>>>>,
    calls: Arc<Mutex<Vec<SearchTask>>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, listings: Vec<RawListing>) -> Self {
        self.responses.lock().unwrap().push(Ok(listings));
        self
    }

    pub fn with_error(self, error: AppError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    /// How many fetch calls the source has seen.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSource for MockSource {
    async fn fetch(
        &self,
        task: &SearchTask,
        _options: &FetchConfig,
    ) -> Result<Vec<RawListing>, AppError> {
        self.calls.lock().unwrap().push(task.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(vec![])
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// Mock store that records upserted batches and classifies created versus
/// updated against a configurable set of pre-existing identities.
#[derive(Clone)]
pub struct MockStore {
    upserts: Arc<Mutex<Vec<Vec<Listing>>>>,
    present: Arc<Mutex<HashSet<String>>>,
    upsert_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            upserts: Arc::new(Mutex::new(Vec::new())),
            present: Arc::new(Mutex::new(HashSet::new())),
            upsert_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Pretend these identities were persisted by an earlier run.
    pub fn with_present(self, identities: &[&str]) -> Self {
        self.present
            .lock()
            .unwrap()
            .extend(identities.iter().map(|i| i.to_string()));
        self
    }

    /// Store that returns an error on the next batch upsert.
    pub fn with_upsert_error(self, error: AppError) -> Self {
        *self.upsert_error.lock().unwrap() = Some(error);
        self
    }

    /// Recorded upsert batches, in call order.
    pub fn upserted(&self) -> Vec<Vec<Listing>> {
        self.upserts.lock().unwrap().clone()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingStore for MockStore {
    async fn batch_upsert(
        &self,
        listings: &[Listing],
        _today: NaiveDate,
    ) -> Result<UpsertCounts, AppError> {
        let mut err = self.upsert_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }

        let mut present = self.present.lock().unwrap();
        let mut counts = UpsertCounts::default();
        for listing in listings {
            if present.insert(listing.identity.clone()) {
                counts.created += 1;
            } else {
                counts.updated += 1;
            }
        }
        self.upserts.lock().unwrap().push(listings.to_vec());
        Ok(counts)
    }

    async fn ids_present(&self, identities: &[String]) -> Result<HashSet<String>, AppError> {
        let present = self.present.lock().unwrap();
        Ok(identities
            .iter()
            .filter(|id| present.contains(*id))
            .cloned()
            .collect())
    }

    async fn first_seen_on(&self, _date: NaiveDate) -> Result<Vec<PersistedRecord>, AppError> {
        Ok(vec![])
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a minimal listing with only the required fields set.
pub fn make_raw_listing(title: &str, company: &str, location: &str) -> RawListing {
    RawListing::new(title, company, location, Source::Indeed)
}
