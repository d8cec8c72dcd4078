use std::collections::HashSet;
use std::future::Future;

use chrono::NaiveDate;

use crate::config::FetchConfig;
use crate::error::AppError;
use crate::models::{
    Listing, NotificationData, PersistedRecord, RawListing, SearchTask, UpsertCounts,
};

/// Retrieves raw listings for one search task.
pub trait JobSource: Send + Sync + Clone {
    fn fetch(
        &self,
        task: &SearchTask,
        options: &FetchConfig,
    ) -> impl Future<Output = Result<Vec<RawListing>, AppError>> + Send;
}

/// Persists scored listings and answers the queries a run needs.
pub trait ListingStore: Send + Sync + Clone {
    /// Upsert a batch atomically. `today` stamps `last_seen` (and
    /// `first_seen` for rows that did not exist before the call).
    fn batch_upsert(
        &self,
        listings: &[Listing],
        today: NaiveDate,
    ) -> impl Future<Output = Result<UpsertCounts, AppError>> + Send;

    /// Which of the given identities already exist in the store.
    fn ids_present(
        &self,
        identities: &[String],
    ) -> impl Future<Output = Result<HashSet<String>, AppError>> + Send;

    /// Records whose `first_seen` equals `date`, score-descending.
    fn first_seen_on(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<PersistedRecord>, AppError>> + Send;
}

/// Delivers an end-of-run summary somewhere a human will see it.
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the channel has everything it needs to deliver. Unconfigured
    /// channels are skipped silently rather than treated as errors.
    fn is_configured(&self) -> bool;

    fn send(&self, data: &NotificationData) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op ListingStore for dry runs, where listings are scored and
/// reported but nothing is written.
#[derive(Debug, Clone)]
pub struct NullListingStore;

impl ListingStore for NullListingStore {
    async fn batch_upsert(
        &self,
        _listings: &[Listing],
        _today: NaiveDate,
    ) -> Result<UpsertCounts, AppError> {
        Ok(UpsertCounts::default())
    }

    async fn ids_present(&self, _identities: &[String]) -> Result<HashSet<String>, AppError> {
        Ok(HashSet::new())
    }

    async fn first_seen_on(&self, _date: NaiveDate) -> Result<Vec<PersistedRecord>, AppError> {
        Ok(vec![])
    }
}
