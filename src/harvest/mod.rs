//! Repository acquisition pipeline
//!
//! This module discovers candidate repositories for one language ecosystem, ranks and
//! filters them, and shallow-clones the accepted ones.
//!
//! # Implementation Model
//!
//! Data flows one way through three stages:
//! - **Discovery**: [`DiscoveryClient`] merges seed repositories with GitHub search
//!   results, fetches details and language breakdowns, and produces
//!   [`RepositoryRecord`]s ordered by quality score.
//! - **Scoring and filtering**: [`score`] turns a metadata snapshot into a 0-100 quality
//!   score and [`AcceptanceCriteria`] rejects repositories that are too small, too
//!   large, inactive, or written mostly in other languages.
//! - **Cloning**: [`CloneEngine`] runs shallow clones on a bounded pool of tasks,
//!   retrying transient failures and reusing clones already on disk.
//!
//! Every API request passes through a [`RateLimiter`] (a fixed window reconciled with
//! the remote quota headers) wrapped in an [`AdaptiveLimiter`] that slows down after
//! throttling. Results, checkpoints, and [`CorpusStats`] are persisted through [`store`].

mod backoff;
pub mod clone;
mod clock;
mod criteria;
mod discovery;
pub mod forge;
mod progress;
mod rate_limiter;
pub(crate) mod record;
mod repo_id;
mod scoring;
mod stats;
pub mod store;

pub use backoff::{AdaptiveBackoff, AdaptiveLimiter, BackoffSettings, MAX_RETRY_HINT};
pub use clock::{Clock, FixedClock, SystemClock};
pub use clone::{CloneEngine, CloneFailure, CloneFailureClass, CloneOutcome, CloneSettings, GitBackend, GitRun, ProcessGit};
pub use criteria::{AcceptanceCriteria, Rejection};
pub use discovery::{DiscoveryClient, DiscoverySettings, FetchError, Limiters, RateLimitConfig};
pub use forge::LanguageHistogram;
pub use progress::Progress;
pub use rate_limiter::{
    CRITICAL_MARK, DEFAULT_BUFFER, LOW_WATER_MARK, LimiterStatus, MAX_FORCED_WAIT, QuotaInfo, RateLimitSettings, RateLimitWindow,
    RateLimiter,
};
pub use record::{RepoMetadata, RepositoryRecord};
pub use repo_id::RepoId;
pub use scoring::{ScoreBreakdown, ScoringConfig, score, target_language_fraction};
pub use stats::{CloneStats, CloneSummary, CorpusStats, DiscoveryStats, RepositorySummary, StarsDistribution};
