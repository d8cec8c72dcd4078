//! Fuzzy validation of retrieved listings against their originating task.
//!
//! Providers happily return "Sales Manager" for a "rust developer" query.
//! When enabled, every significant term of the query (and location, unless
//! the task targets a generic remote marker) must show up in the listing's
//! searchable text, either verbatim or within a normalized edit-distance
//! similarity, so typos and diacritic variants still count.

use crate::config::PostFilterConfig;
use crate::models::{RawListing, SearchTask};
use crate::scoring::listing_text;
use crate::textnorm::{extract_words, normalize};

/// Location values that mean "no particular place"; checking them against
/// listing text would reject perfectly good remote results.
pub fn is_remote_marker(location: &str) -> bool {
    matches!(normalize(location).trim(), "remote" | "worldwide" | "anywhere")
}

#[derive(Clone)]
pub struct PostFilter {
    min_similarity: f64,
    check_query_terms: bool,
    check_location: bool,
}

impl PostFilter {
    /// Build from config; `None` when the filter is disabled.
    pub fn from_config(config: &PostFilterConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            min_similarity: f64::from(config.min_similarity),
            check_query_terms: config.check_query_terms,
            check_location: config.check_location,
        })
    }

    /// Filter with both checks on; mostly for tests.
    pub fn new(min_similarity: u8) -> Self {
        Self {
            min_similarity: f64::from(min_similarity),
            check_query_terms: true,
            check_location: true,
        }
    }

    /// Does this listing plausibly answer the task that produced it?
    pub fn passes(&self, listing: &RawListing, task: &SearchTask) -> bool {
        let blob = listing_text(listing);
        let blob_words = extract_words(&blob);

        if self.check_query_terms {
            for term in extract_words(&task.query) {
                if !self.term_matches(&term, &blob, &blob_words) {
                    tracing::debug!(
                        title = %listing.title,
                        term = %term,
                        "post-filter dropped listing: query term missing"
                    );
                    return false;
                }
            }
        }

        if self.check_location && !is_remote_marker(&task.location) {
            for term in extract_words(&task.location) {
                if !self.term_matches(&term, &blob, &blob_words) {
                    tracing::debug!(
                        title = %listing.title,
                        term = %term,
                        "post-filter dropped listing: location term missing"
                    );
                    return false;
                }
            }
        }

        true
    }

    fn term_matches(&self, term: &str, blob: &str, blob_words: &[String]) -> bool {
        if blob.contains(term) {
            return true;
        }
        blob_words
            .iter()
            .any(|word| strsim::normalized_levenshtein(term, word) * 100.0 >= self.min_similarity)
    }
}
