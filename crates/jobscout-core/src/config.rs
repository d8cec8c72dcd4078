//! Run configuration.
//!
//! The whole configuration is loaded once at startup into an immutable
//! [`AppConfig`] snapshot and passed by reference from there on. The
//! scheduler reloads between runs by building a fresh snapshot; nothing
//! ever mutates a live one.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::models::Source;

/// Top-level configuration snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub executor: ExecutorConfig,
    pub throttle: ThrottleConfig,
    pub retry: RetryConfig,
    pub scoring: ScoringConfig,
    pub post_filter: PostFilterConfig,
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    pub scheduler: SchedulerConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load a snapshot from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: AppConfig = toml::from_str(&raw).map_err(|e| {
            AppError::ConfigError(format!("invalid config {}: {e}", path.display()))
        })?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup closure.
    ///
    /// Secrets never belong in the config file; `TELEGRAM_BOT_TOKEN` wins
    /// over whatever the file says, and `JOBSCOUT_DB_PATH` relocates the
    /// store for containerized deployments.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(token) = get("TELEGRAM_BOT_TOKEN")
            && !token.is_empty()
        {
            self.notify.telegram.bot_token = token;
        }
        if let Some(path) = get("JOBSCOUT_DB_PATH")
            && !path.is_empty()
        {
            self.store.path = path;
        }
    }

    /// Validate numeric parameters. Called once at startup; a failure here
    /// aborts before any task executes.
    pub fn validate(&self) -> Result<(), AppError> {
        fn bad(field: &str, why: &str) -> AppError {
            AppError::ConfigError(format!("{field}: {why}"))
        }

        if self.executor.max_workers < 1 {
            return Err(bad("executor.max_workers", "must be at least 1"));
        }
        if self.retry.max_attempts < 1 {
            return Err(bad("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_secs <= 0.0 {
            return Err(bad("retry.base_delay_secs", "must be positive"));
        }
        if self.retry.backoff_factor < 1.0 {
            return Err(bad("retry.backoff_factor", "must be at least 1.0"));
        }
        if self.throttle.default_delay_secs < 0.0 {
            return Err(bad("throttle.default_delay_secs", "must not be negative"));
        }
        if self.throttle.source_delays.values().any(|d| *d < 0.0) {
            return Err(bad("throttle.source_delays", "delays must not be negative"));
        }
        if !(0.0..1.0).contains(&self.throttle.jitter) {
            return Err(bad("throttle.jitter", "must be in [0, 1)"));
        }
        if self.throttle.cooldown_secs < 0.0 {
            return Err(bad("throttle.cooldown_secs", "must not be negative"));
        }
        if self.post_filter.min_similarity > 100 {
            return Err(bad("post_filter.min_similarity", "must be in 0..=100"));
        }
        if self.fetch.api_url.is_empty() {
            return Err(bad("fetch.api_url", "must not be empty"));
        }
        if self.fetch.results_wanted < 1 {
            return Err(bad("fetch.results_wanted", "must be at least 1"));
        }
        if self.fetch.timeout_secs < 1 {
            return Err(bad("fetch.timeout_secs", "must be at least 1"));
        }
        if self.store.path.is_empty() {
            return Err(bad("store.path", "must not be empty"));
        }
        if self.store.max_connections < 1 {
            return Err(bad("store.max_connections", "must be at least 1"));
        }
        if self.store.retention_days == Some(0) {
            return Err(bad("store.retention_days", "must be at least 1 when set"));
        }
        if self.scheduler.interval_hours < 1 {
            return Err(bad("scheduler.interval_hours", "must be at least 1"));
        }
        if self.scheduler.retry_delay_minutes < 1 {
            return Err(bad("scheduler.retry_delay_minutes", "must be at least 1"));
        }
        Ok(())
    }
}

/// What to search for: query categories, locations, and providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Query strings grouped into named categories. Categories only
    /// organize the config file; the task generator flattens them.
    pub queries: BTreeMap<String, Vec<String>>,
    pub locations: Vec<String>,
    pub sources: Vec<Source>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            queries: BTreeMap::new(),
            locations: vec!["Remote".to_string()],
            sources: vec![Source::Indeed, Source::Linkedin, Source::Glassdoor],
        }
    }
}

/// Parameters forwarded to the retrieval API with every task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL of the self-hosted search API.
    pub api_url: String,
    pub timeout_secs: u64,
    pub results_wanted: u32,
    /// Only listings posted within the last N hours.
    pub hours_old: u32,
    pub job_type: Option<String>,
    pub is_remote: Option<bool>,
    pub easy_apply: Option<bool>,
    /// Indeed needs to know which national domain to search.
    pub country_indeed: String,
    /// Fetch full LinkedIn descriptions (slower but scoreable).
    pub linkedin_fetch_description: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 90,
            results_wanted: 50,
            hours_old: 720,
            job_type: None,
            is_remote: None,
            easy_apply: None,
            country_indeed: "USA".to_string(),
            linkedin_fetch_description: true,
        }
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// Per-source request pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub default_delay_secs: f64,
    pub source_delays: HashMap<Source, f64>,
    /// Jitter fraction in [0, 1): each wait is scaled by a fresh uniform
    /// factor in [1 - jitter, 1 + jitter).
    pub jitter: f64,
    /// Extra one-shot delay after a source signals a rate limit.
    pub cooldown_secs: f64,
}

impl ThrottleConfig {
    /// Base delay for a source, before jitter.
    pub fn delay_for(&self, source: Source) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        let secs = self
            .source_delays
            .get(&source)
            .copied()
            .unwrap_or(self.default_delay_secs);
        Duration::from_secs_f64(secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let source_delays = HashMap::from([
            (Source::Linkedin, 3.0),
            (Source::Indeed, 1.0),
            (Source::Glassdoor, 1.5),
            (Source::Google, 2.0),
            (Source::ZipRecruiter, 1.5),
        ]);
        Self {
            enabled: true,
            default_delay_secs: 1.5,
            source_delays,
            jitter: 0.3,
            cooldown_secs: 30.0,
        }
    }
}

/// Bounded exponential backoff for transient retrieval failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub backoff_factor: f64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            backoff_factor: 2.0,
        }
    }
}

/// Keyword-category scoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Listings scoring below this are not persisted.
    pub threshold: i32,
    pub categories: BTreeMap<String, CategoryConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            categories: BTreeMap::new(),
        }
    }
}

/// One scoring category: a weight and the keywords that trigger it.
/// The weight may be negative to push listings down.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub weight: i32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Fuzzy validation of results against their originating task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostFilterConfig {
    pub enabled: bool,
    /// Minimum similarity (0-100) for a fuzzy term match.
    pub min_similarity: u8,
    pub check_query_terms: bool,
    pub check_location: bool,
}

impl Default for PostFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_similarity: 80,
            check_query_terms: true,
            check_location: true,
        }
    }
}

/// Where and how listings are persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub max_connections: u32,
    /// Re-apply current scoring to every stored record at startup.
    pub recalculate_on_start: bool,
    /// Delete records not seen for this many days. Unset disables the sweep.
    pub retention_days: Option<u32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/jobs.db".to_string(),
            max_connections: 5,
            recalculate_on_start: true,
            retention_days: None,
        }
    }
}

/// Notification channels.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    /// Bot token from @BotFather; normally injected via TELEGRAM_BOT_TOKEN.
    pub bot_token: String,
    pub chat_ids: Vec<String>,
    /// Listings below this score are left out of messages.
    pub min_score: i32,
    pub max_listings_per_message: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_ids: Vec::new(),
            min_score: 0,
            max_listings_per_message: 10,
        }
    }
}

/// Interval scheduling for `jobscout schedule`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_hours: u32,
    pub run_on_startup: bool,
    pub retry_on_failure: bool,
    pub retry_delay_minutes: u32,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_hours) * 3600)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.retry_delay_minutes) * 60)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_on_startup: true,
            retry_on_failure: true,
            retry_delay_minutes: 30,
        }
    }
}

/// Per-run CSV outputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: String,
    pub save_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".to_string(),
            save_csv: true,
        }
    }
}
