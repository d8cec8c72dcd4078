//! Per-source request pacing.
//!
//! Every worker shares one [`SourceThrottle`]. `acquire` reserves the
//! caller's dispatch slot inside a short lock and sleeps outside it, so
//! the critical section is a single read-modify-write: a worker waiting
//! out LinkedIn's delay never blocks a worker about to hit Indeed, and
//! the lock never spans a sleep.
//!
//! After a source signals a rate limit, the next dispatch to it is pushed
//! back by an extra one-shot cooldown on top of the regular delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::ThrottleConfig;
use crate::models::Source;

#[derive(Debug, Default)]
struct SourceState {
    /// Earliest instant the next dispatch may happen.
    next_slot: Option<Instant>,
    /// One-shot cooldown armed by a rate-limit signal.
    cooldown_armed: bool,
}

/// Gates how fast tasks may hit each source. Cheap to clone; clones share
/// the same per-source state.
#[derive(Clone)]
pub struct SourceThrottle {
    config: ThrottleConfig,
    state: Arc<Mutex<HashMap<Source, SourceState>>>,
}

impl SourceThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait until it is safe to dispatch a request to `source`, reserving
    /// the slot for this caller.
    pub async fn acquire(&self, source: Source) {
        let wait = {
            let mut state = self.state.lock().await;
            let entry = state.entry(source).or_default();
            let now = Instant::now();

            let mut slot = match entry.next_slot {
                Some(s) if s > now => s,
                _ => now,
            };
            if entry.cooldown_armed {
                entry.cooldown_armed = false;
                slot += self.config.cooldown();
                tracing::info!(
                    source = %source,
                    cooldown_secs = self.config.cooldown_secs,
                    "applying rate-limit cooldown"
                );
            }
            entry.next_slot = Some(slot + self.effective_delay(source));
            slot.duration_since(now)
        };

        if !wait.is_zero() {
            tracing::debug!(
                source = %source,
                wait_ms = wait.as_millis() as u64,
                "throttling dispatch"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Arm a one-shot cooldown after `source` reported a rate limit. The
    /// next `acquire` for that source absorbs it, then the flag clears.
    pub async fn report_rate_limit(&self, source: Source) {
        let mut state = self.state.lock().await;
        let entry = state.entry(source).or_default();
        if !entry.cooldown_armed {
            entry.cooldown_armed = true;
            tracing::warn!(
                source = %source,
                "rate limit reported; cooling down before next dispatch"
            );
        }
    }

    /// Gap between consecutive dispatches: the base delay scaled by a
    /// fresh uniform factor in [1 - jitter, 1 + jitter).
    fn effective_delay(&self, source: Source) -> Duration {
        let base = self.config.delay_for(source);
        if base.is_zero() || self.config.jitter <= 0.0 {
            return base;
        }
        let factor = 1.0 - self.config.jitter + 2.0 * self.config.jitter * rand_unit();
        base.mul_f64(factor)
    }
}

/// Uniform sample in [0, 1): one xorshift64 step seeded from the clock.
/// Suitable for request spacing, nothing stronger.
fn rand_unit() -> f64 {
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
        | 1;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    (x >> 11) as f64 / (1u64 << 53) as f64
}
