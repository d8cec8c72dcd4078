pub mod config;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod models;
pub mod postfilter;
pub mod retry;
pub mod scoring;
pub mod search;
pub mod tasks;
pub mod textnorm;
pub mod throttle;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::AppConfig;
pub use error::AppError;
pub use models::{Listing, PersistedRecord, RawListing, SearchTask, Source, listing_identity};
pub use search::{RunOutcome, SearchService};
pub use traits::{JobSource, ListingStore, NotifyChannel};
