//! Run-scoped deduplication of listings by identity.
//!
//! Workers stream results concurrently, and the same posting routinely
//! arrives from several tasks (and several sources). [`DedupSet::offer`]
//! makes the membership test and insert a single atomic unit, so exactly
//! one worker wins each identity. Identity hashing happens before the
//! call; the critical section is just the set operation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity set shared by all workers for one run. Cheap to clone; clones
/// share the same set.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    seen: Arc<Mutex<HashSet<String>>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an identity if it has not been seen this run.
    ///
    /// Returns true exactly once per identity, no matter how many workers
    /// offer it concurrently.
    pub fn offer(&self, identity: &str) -> bool {
        let owned = identity.to_owned();
        self.lock_seen().insert(owned)
    }

    /// Number of distinct identities admitted so far.
    pub fn len(&self) -> usize {
        self.lock_seen().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_seen().is_empty()
    }

    fn lock_seen(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned dedup mutex");
            poisoned.into_inner()
        })
    }
}
