//! Task generation: the configured cross product of work.

use std::collections::HashSet;

use crate::config::SearchConfig;
use crate::models::SearchTask;

/// Flatten query categories into one duplicate-free list.
///
/// Categories are walked in their (sorted) config order; a query repeated
/// across categories keeps its first position. Comparison is
/// case-insensitive so "Backend Engineer" and "backend engineer" do not
/// hit the API twice.
fn flatten_queries(search: &SearchConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    for category_queries in search.queries.values() {
        for query in category_queries {
            let trimmed = query.trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_lowercase()) {
                queries.push(trimmed.to_string());
            }
        }
    }
    queries
}

/// Expand queries × locations × sources into the run's task list.
///
/// Pure function of the configuration: same snapshot, same list, same
/// order. An empty query or location set yields an empty list, not an
/// error.
pub fn generate_tasks(search: &SearchConfig) -> Vec<SearchTask> {
    let queries = flatten_queries(search);
    let mut tasks =
        Vec::with_capacity(queries.len() * search.locations.len() * search.sources.len());
    for query in &queries {
        for location in &search.locations {
            for source in &search.sources {
                tasks.push(SearchTask::new(query.clone(), location.clone(), *source));
            }
        }
    }
    tasks
}
