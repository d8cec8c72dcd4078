//! Keyword-category relevance scoring.
//!
//! An engine is compiled once per config snapshot from the explicit
//! category map (name → weight + keywords). Scoring is pure: the same
//! listing and the same engine always produce the same score, so the
//! engine can be re-applied to records persisted by earlier runs when
//! the configuration changes.

use crate::config::ScoringConfig;
use crate::models::{PersistedRecord, RawListing};
use crate::textnorm::normalize;

/// Build the normalized searchable blob for a listing's text fields.
///
/// Field order matches what gets scored everywhere: title, description,
/// company, location.
pub fn searchable_text(
    title: &str,
    description: Option<&str>,
    company: &str,
    location: &str,
) -> String {
    let mut parts = vec![title];
    if let Some(d) = description {
        parts.push(d);
    }
    parts.push(company);
    parts.push(location);
    normalize(&parts.join(" "))
}

/// Blob for a freshly retrieved listing.
pub fn listing_text(listing: &RawListing) -> String {
    searchable_text(
        &listing.title,
        listing.description.as_deref(),
        &listing.company,
        &listing.location,
    )
}

/// Blob for a persisted record (used when re-scoring the store).
pub fn record_text(record: &PersistedRecord) -> String {
    searchable_text(
        &record.title,
        record.description.as_deref(),
        &record.company,
        &record.location,
    )
}

#[derive(Clone)]
struct Category {
    name: String,
    weight: i32,
    /// Normalized at engine build; empty keywords are dropped there.
    keywords: Vec<String>,
}

/// Compiled scoring engine.
#[derive(Clone)]
pub struct ScoringEngine {
    categories: Vec<Category>,
    threshold: i32,
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        let categories = config
            .categories
            .iter()
            .map(|(name, category)| Category {
                name: name.clone(),
                weight: category.weight,
                keywords: category
                    .keywords
                    .iter()
                    .map(|k| normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self {
            categories,
            threshold: config.threshold,
        }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn is_relevant(&self, score: i32) -> bool {
        score >= self.threshold
    }

    /// Score a pre-normalized blob.
    ///
    /// A category contributes its full weight exactly once if any of its
    /// keywords occurs as a substring, no matter how many of them match.
    pub fn score_text(&self, blob: &str) -> i32 {
        let mut total = 0;
        for category in &self.categories {
            if category
                .keywords
                .iter()
                .any(|keyword| blob.contains(keyword.as_str()))
            {
                tracing::trace!(
                    category = %category.name,
                    weight = category.weight,
                    "scoring category matched"
                );
                total += category.weight;
            }
        }
        total
    }

    pub fn score_listing(&self, listing: &RawListing) -> i32 {
        self.score_text(&listing_text(listing))
    }

    pub fn score_record(&self, record: &PersistedRecord) -> i32 {
        self.score_text(&record_text(record))
    }
}
