//! Aggregate statistics over discovery results and clone outcomes.

use super::clone::{CloneFailureClass, CloneOutcome};
use super::{RepoId, RepositoryRecord};
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use strum::IntoEnumIterator;

/// Running totals kept while clones finish.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CloneStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub short_circuited: usize,
    pub total_size_mb: f64,
}

impl CloneStats {
    pub fn record(&mut self, outcome: &CloneOutcome) {
        self.attempted += 1;
        if outcome.is_success() {
            self.succeeded += 1;
            self.total_size_mb += outcome.size_mb();
            if outcome.short_circuited() {
                self.short_circuited += 1;
            }
        } else {
            self.failed += 1;
        }
    }

    /// Fraction of attempts that succeeded, 0 when nothing was attempted.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counts are far below 2^52")]
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

impl Display for CloneStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} attempted, {} succeeded ({} reused), {} failed, {:.1} MiB",
            self.attempted, self.succeeded, self.short_circuited, self.failed, self.total_size_mb
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarsDistribution {
    pub min: u32,
    pub max: u32,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    pub total_repositories_discovered: usize,
    pub average_quality_score: f64,
    pub top_quality_score: f64,

    /// Repositories per primary language; `Unknown` when GitHub reports none
    pub languages_distribution: BTreeMap<String, usize>,
    pub stars_distribution: StarsDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneSummary {
    pub total_attempted: usize,
    pub successful_clones: usize,
    pub failed_clones: usize,
    pub reused_clones: usize,

    /// Fraction in `[0, 1]`
    pub success_rate: f64,
    pub total_size_mb: f64,
    pub average_size_mb: f64,
    pub total_clone_time_secs: f64,
    pub failures_by_class: BTreeMap<CloneFailureClass, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub full_name: RepoId,
    pub stars: u32,
    pub quality_score: f64,
    pub target_language_percentage: f64,
    pub cloned_successfully: bool,
}

/// Contents of `stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub generation_date: DateTime<Utc>,
    pub discovery_stats: DiscoveryStats,
    pub clone_stats: CloneSummary,

    /// Every discovered repository, highest score first
    pub repository_list: Vec<RepositorySummary>,
}

impl CorpusStats {
    /// Summarize a run. Either input may be empty; averages of nothing are 0.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counts are far below 2^52")]
    pub fn compute(records: &[RepositoryRecord], outcomes: &[CloneOutcome], now: DateTime<Utc>) -> Self {
        let count = records.len();
        let average = |sum: f64| if count == 0 { 0.0 } else { sum / count as f64 };

        let mut languages_distribution = BTreeMap::new();
        for record in records {
            let language = record.metadata().language.clone().unwrap_or_else(|| "Unknown".to_string());
            *languages_distribution.entry(language).or_insert(0) += 1;
        }

        let discovery_stats = DiscoveryStats {
            total_repositories_discovered: count,
            average_quality_score: average(records.iter().map(RepositoryRecord::quality_score).sum()),
            top_quality_score: records.iter().map(RepositoryRecord::quality_score).fold(0.0, f64::max),
            languages_distribution,
            stars_distribution: StarsDistribution {
                min: records.iter().map(RepositoryRecord::stars).min().unwrap_or(0),
                max: records.iter().map(RepositoryRecord::stars).max().unwrap_or(0),
                average: average(records.iter().map(|r| f64::from(r.stars())).sum()),
            },
        };

        let mut totals = CloneStats::default();
        let mut failures_by_class: BTreeMap<_, _> = CloneFailureClass::iter().map(|class| (class, 0)).collect();
        for outcome in outcomes {
            totals.record(outcome);
            if let Some(failure) = outcome.failure() {
                *failures_by_class.entry(failure.class).or_insert(0) += 1;
            }
        }

        let clone_stats = CloneSummary {
            total_attempted: outcomes.len(),
            successful_clones: totals.succeeded,
            failed_clones: totals.failed,
            reused_clones: totals.short_circuited,
            success_rate: totals.success_rate(),
            total_size_mb: totals.total_size_mb,
            average_size_mb: if totals.succeeded == 0 {
                0.0
            } else {
                totals.total_size_mb / totals.succeeded as f64
            },
            total_clone_time_secs: outcomes.iter().map(|o| o.elapsed().as_secs_f64()).sum(),
            failures_by_class,
        };

        let cloned: HashSet<&RepoId> = outcomes.iter().filter(|o| o.is_success()).map(CloneOutcome::id).collect();
        let mut ranked: Vec<&RepositoryRecord> = records.iter().collect();
        ranked.sort_by(|a, b| b.quality_score().total_cmp(&a.quality_score()).then_with(|| a.id().cmp(b.id())));

        let repository_list = ranked
            .into_iter()
            .map(|record| RepositorySummary {
                full_name: record.id().clone(),
                stars: record.stars(),
                quality_score: record.quality_score(),
                target_language_percentage: record.target_language_fraction() * 100.0,
                cloned_successfully: cloned.contains(record.id()),
            })
            .collect();

        Self {
            generation_date: now,
            discovery_stats,
            clone_stats,
            repository_list,
        }
    }
}
