//! Repository discovery through the GitHub API.
//!
//! Discovery runs sequentially: seed repositories and search results are merged into
//! one ordered candidate set, each candidate is fetched (details plus language
//! breakdown), scored, and filtered. Every request passes through the shared
//! [`Limiters`], and a failure on one candidate never aborts the run.

use super::forge::{ApiResult, Client, LanguageHistogram, RepositoryDetail, SearchPage};
use super::{
    AcceptanceCriteria, AdaptiveLimiter, BackoffSettings, Clock, RateLimitSettings, RateLimiter, RepoId, RepoMetadata,
    RepositoryRecord, ScoringConfig,
};
use crate::Result;
use core::fmt::{Display, Formatter};
use core::time::Duration;
use ohno::app_err;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const LOG_TARGET: &str = "   discovery";

/// GitHub never returns more than this many items per page.
const MAX_PER_PAGE: usize = 100;

/// Progress is logged every this many candidates.
const PROGRESS_INTERVAL: usize = 10;

/// Discovery limits and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoverySettings {
    /// Language whose share of source bytes drives purity scoring and filtering
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Stop once this many repositories have been accepted
    #[serde(default = "default_max_repositories")]
    pub max_repositories: usize,

    /// Upper bound on results taken from a single search query
    #[serde(default = "default_max_repos_per_search")]
    pub max_repos_per_search: usize,

    /// Attempts per request before the item is skipped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts after a transient failure; attempt `n` waits `n` times this.
    /// Zero disables the wait entirely.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_target_language() -> String {
    "Erlang".to_string()
}

const fn default_max_repositories() -> usize {
    200
}

const fn default_max_repos_per_search() -> usize {
    1000
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    2
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            max_repositories: default_max_repositories(),
            max_repos_per_search: default_max_repos_per_search(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl DiscoverySettings {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(app_err!("target_language must not be empty"));
        }

        if self.max_repositories == 0 {
            return Err(app_err!("max_repositories must be greater than 0"));
        }

        if self.max_repos_per_search == 0 {
            return Err(app_err!("max_repos_per_search must be greater than 0"));
        }

        if self.max_retries == 0 {
            return Err(app_err!("discovery max_retries must be greater than 0"));
        }

        Ok(())
    }
}

/// Request budgets for the GitHub API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Core API requests per hour with a token
    #[serde(default = "default_core_per_hour_with_token")]
    pub core_per_hour_with_token: u32,

    /// Core API requests per hour without a token
    #[serde(default = "default_core_per_hour_anonymous")]
    pub core_per_hour_anonymous: u32,

    /// Search API requests per minute with a token
    #[serde(default = "default_search_per_minute_with_token")]
    pub search_per_minute_with_token: u32,

    /// Search API requests per minute without a token
    #[serde(default = "default_search_per_minute_anonymous")]
    pub search_per_minute_anonymous: u32,

    /// Fraction of each limit held back, in `[0, 1)`
    #[serde(default = "default_buffer")]
    pub buffer: f64,

    /// Smallest pause between core API requests
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Largest pause between core API requests while throttled
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_core_per_hour_with_token() -> u32 {
    5000
}

const fn default_core_per_hour_anonymous() -> u32 {
    60
}

const fn default_search_per_minute_with_token() -> u32 {
    30
}

const fn default_search_per_minute_anonymous() -> u32 {
    10
}

const fn default_buffer() -> f64 {
    super::rate_limiter::DEFAULT_BUFFER
}

const fn default_min_delay_ms() -> u64 {
    100
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            core_per_hour_with_token: default_core_per_hour_with_token(),
            core_per_hour_anonymous: default_core_per_hour_anonymous(),
            search_per_minute_with_token: default_search_per_minute_with_token(),
            search_per_minute_anonymous: default_search_per_minute_anonymous(),
            buffer: default_buffer(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn core_settings(&self, authenticated: bool) -> RateLimitSettings {
        let limit = if authenticated {
            self.core_per_hour_with_token
        } else {
            self.core_per_hour_anonymous
        };
        RateLimitSettings::hourly(limit).with_buffer(self.buffer)
    }

    #[must_use]
    pub const fn search_settings(&self, authenticated: bool) -> RateLimitSettings {
        let limit = if authenticated {
            self.search_per_minute_with_token
        } else {
            self.search_per_minute_anonymous
        };
        RateLimitSettings::per_minute(limit).with_buffer(self.buffer)
    }

    #[must_use]
    pub const fn backoff(&self) -> BackoffSettings {
        BackoffSettings {
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("core_per_hour_with_token", self.core_per_hour_with_token),
            ("core_per_hour_anonymous", self.core_per_hour_anonymous),
            ("search_per_minute_with_token", self.search_per_minute_with_token),
            ("search_per_minute_anonymous", self.search_per_minute_anonymous),
        ];

        for (name, value) in limits {
            if value == 0 {
                return Err(app_err!("{name} must be greater than 0"));
            }
        }

        if !(0.0..1.0).contains(&self.buffer) {
            return Err(app_err!("buffer must be at least 0 and less than 1, got {}", self.buffer));
        }

        if self.min_delay_ms > self.max_delay_ms {
            return Err(app_err!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            ));
        }

        Ok(())
    }
}

/// The limiters every API request passes through.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Core API budget with adaptive pacing; search requests count against it too
    pub core: Arc<AdaptiveLimiter>,

    /// Search API budget
    pub search: Arc<RateLimiter>,
}

impl Limiters {
    #[must_use]
    pub fn new(config: &RateLimitConfig, authenticated: bool, clock: &Arc<dyn Clock>) -> Self {
        let core = RateLimiter::new("core", config.core_settings(authenticated), Arc::clone(clock));
        let search = RateLimiter::new("search", config.search_settings(authenticated), Arc::clone(clock));

        Self {
            core: Arc::new(AdaptiveLimiter::new(core, config.backoff())),
            search: Arc::new(search),
        }
    }
}

/// Why fetching a single item failed.
#[derive(Debug)]
pub enum FetchError {
    /// The resource does not exist (404); never retried
    NotFound,

    /// The request cannot succeed on retry (malformed response, unexpected status)
    Permanent(ohno::AppError),

    /// Every attempt failed with a retryable error
    RetriesExhausted { attempts: u32, last_error: String },
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Permanent(e) => write!(f, "{e}"),
            Self::RetriesExhausted { attempts, last_error } => {
                write!(f, "gave up after {attempts} attempt(s): {last_error}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Core,
    Search,
}

/// Discovers, scores, and filters repositories.
#[derive(Debug)]
pub struct DiscoveryClient {
    client: Client,
    limiters: Limiters,
    settings: DiscoverySettings,
    criteria: AcceptanceCriteria,
    scoring: ScoringConfig,
    clock: Arc<dyn Clock>,
}

impl DiscoveryClient {
    #[must_use]
    pub const fn new(
        client: Client,
        limiters: Limiters,
        settings: DiscoverySettings,
        criteria: AcceptanceCriteria,
        scoring: ScoringConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            limiters,
            settings,
            criteria,
            scoring,
            clock,
        }
    }

    #[must_use]
    pub const fn limiters(&self) -> &Limiters {
        &self.limiters
    }

    /// Discover repositories from seeds and search queries.
    ///
    /// Returns the accepted records, highest quality score first, ties broken by id.
    pub async fn discover_all(&self, seeds: &[RepoId], queries: &[String], max_results_per_query: usize) -> Vec<RepositoryRecord> {
        let mut candidates: BTreeSet<RepoId> = seeds.iter().cloned().collect();
        log::info!(target: LOG_TARGET, "Starting discovery with {} seed repositories", candidates.len());

        for query in queries {
            let found = self.search_repositories(query, max_results_per_query).await;
            log::info!(target: LOG_TARGET, "Search '{query}' returned {} repositories", found.len());
            candidates.extend(found);
        }

        log::info!(target: LOG_TARGET, "Evaluating {} unique candidate repositories", candidates.len());

        let now = self.clock.now();
        let mut accepted = Vec::new();
        let mut seen = BTreeSet::new();
        let mut failed = 0_usize;
        let mut rejected = 0_usize;

        for (index, id) in candidates.iter().enumerate() {
            if accepted.len() >= self.settings.max_repositories {
                log::info!(target: LOG_TARGET, "Reached maximum repository limit: {}", self.settings.max_repositories);
                break;
            }

            if index > 0 && index % PROGRESS_INTERVAL == 0 {
                log::info!(target: LOG_TARGET,
                    "Processed {index}/{} candidates ({} accepted), core limiter: {}",
                    candidates.len(),
                    accepted.len(),
                    self.limiters.core.status().await
                );
            }

            let record = match self.fetch_record(id).await {
                Ok(record) => record,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping '{id}': {e}");
                    failed += 1;
                    continue;
                }
            };

            // seeds and search results may name the same repository with different casing
            if !seen.insert(record.id().clone()) {
                continue;
            }

            match self.criteria.evaluate(&record, now) {
                Ok(()) => {
                    log::debug!(target: LOG_TARGET, "Accepted '{}' (score {:.1})", record.id(), record.quality_score());
                    accepted.push(record);
                }
                Err(rejection) => {
                    log::debug!(target: LOG_TARGET, "Rejected '{id}': {rejection}");
                    rejected += 1;
                }
            }
        }

        accepted.sort_by(|a, b| {
            b.quality_score()
                .total_cmp(&a.quality_score())
                .then_with(|| a.id().cmp(b.id()))
        });

        log::info!(target: LOG_TARGET,
            "Discovery complete: {} accepted, {rejected} rejected, {failed} failed",
            accepted.len()
        );

        accepted
    }

    /// Run one search query, following pages until `max_results` ids are collected,
    /// a short page arrives, or a request fails.
    pub async fn search_repositories(&self, query: &str, max_results: usize) -> Vec<RepoId> {
        let mut found = Vec::new();
        if max_results == 0 {
            return found;
        }

        let per_page = max_results.min(MAX_PER_PAGE);
        let mut page = 1_u32;

        while found.len() < max_results {
            let params = [
                ("q", query.to_string()),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ];

            let result: SearchPage = match self.request(RequestKind::Search, "/search/repositories", &params).await {
                Ok(result) => result,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Search '{query}' failed on page {page}: {e}");
                    break;
                }
            };

            if result.incomplete_results {
                log::debug!(target: LOG_TARGET, "Search '{query}' page {page} reported incomplete results");
            }

            let count = result.items.len();
            for item in result.items.into_iter().take(max_results - found.len()) {
                match RepoId::parse(&item.full_name) {
                    Ok(id) => found.push(id),
                    Err(e) => log::debug!(target: LOG_TARGET, "Ignoring search result '{}': {e}", item.full_name),
                }
            }

            if count < per_page {
                break;
            }

            page += 1;
        }

        found
    }

    /// Fetch details and language breakdown of one repository and build its record.
    pub async fn fetch_record(&self, id: &RepoId) -> Result<RepositoryRecord, FetchError> {
        let detail: RepositoryDetail = self.request(RequestKind::Core, &format!("/repos/{id}"), &[]).await?;

        let languages = match self
            .request::<LanguageHistogram>(RequestKind::Core, &format!("/repos/{id}/languages"), &[])
            .await
        {
            Ok(languages) => languages,
            Err(FetchError::NotFound) => LanguageHistogram::new(),
            Err(e) => return Err(e),
        };

        let metadata = RepoMetadata::from_detail(detail, languages).map_err(FetchError::Permanent)?;

        Ok(RepositoryRecord::new(
            metadata,
            &self.settings.target_language,
            &self.scoring,
            self.clock.now(),
        ))
    }

    /// Issue one API request through the limiters, retrying throttled and transient failures.
    async fn request<T: DeserializeOwned>(&self, kind: RequestKind, path: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let attempts = self.settings.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if kind == RequestKind::Search {
                self.limiters.search.acquire().await;
            }
            self.limiters.core.acquire().await;

            let result = self.client.get_json::<T>(path, query).await;

            match kind {
                RequestKind::Search => {
                    self.limiters.search.record(result.quota()).await;
                    self.limiters.core.record(None).await;
                }
                RequestKind::Core => self.limiters.core.record(result.quota()).await,
            }

            match result {
                ApiResult::Success(value, _) => {
                    self.limiters.core.on_succeeded();
                    return Ok(value);
                }

                ApiResult::Throttled { retry_after, .. } => {
                    log::warn!(target: LOG_TARGET, "Throttled on '{path}' (attempt {attempt}/{attempts})");
                    self.limiters.core.on_throttled(retry_after);
                    last_error = "throttled by the remote API".to_string();
                }

                ApiResult::NotFound(_) => return Err(FetchError::NotFound),

                ApiResult::Failed {
                    error, transient: false, ..
                } => return Err(FetchError::Permanent(error)),

                ApiResult::Failed { error, .. } => {
                    last_error = error.to_string();
                    if attempt < attempts {
                        let delay = self.settings.retry_delay().saturating_mul(attempt);
                        log::warn!(target: LOG_TARGET,
                            "Request '{path}' failed (attempt {attempt}/{attempts}), retrying in {}s: {error}",
                            delay.as_secs()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted { attempts, last_error })
    }
}
