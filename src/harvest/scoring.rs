//! Quality scoring of discovered repositories.
//!
//! The score is the sum of five components, clamped to `[0, 100]`:
//!
//! | Component  | Range   | Rule                                                    |
//! |------------|---------|---------------------------------------------------------|
//! | popularity | 0..=40  | `min(40, sqrt(stars))`                                  |
//! | recency    | 0..=20  | updated < 30 days ago: 20, < 90: 15, < 365: 10          |
//! | purity     | 0..=20  | `20 × target_language_fraction`                         |
//! | features   | 0..=10  | wiki +3, issues +3, non-empty description +4            |
//! | size       | 0..=10  | +10 inside the sweet spot, +2 below it, 0 above it      |

use super::RepoMetadata;
use super::forge::LanguageHistogram;
use crate::Result;
use chrono::{DateTime, Utc};
use ohno::app_err;
use serde::{Deserialize, Serialize};

const MAX_POPULARITY: f64 = 40.0;
const MAX_PURITY: f64 = 20.0;

/// Size range, in KiB, considered ideal for a corpus entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(default = "default_sweet_spot_min_kb")]
    pub sweet_spot_min_kb: u64,

    #[serde(default = "default_sweet_spot_max_kb")]
    pub sweet_spot_max_kb: u64,
}

const fn default_sweet_spot_min_kb() -> u64 {
    100
}

const fn default_sweet_spot_max_kb() -> u64 {
    50_000
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sweet_spot_min_kb: default_sweet_spot_min_kb(),
            sweet_spot_max_kb: default_sweet_spot_max_kb(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweet_spot_min_kb > self.sweet_spot_max_kb {
            return Err(app_err!(
                "sweet_spot_min_kb ({}) must not exceed sweet_spot_max_kb ({})",
                self.sweet_spot_min_kb,
                self.sweet_spot_max_kb
            ));
        }

        Ok(())
    }
}

/// The individual components of a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub popularity: f64,
    pub recency: f64,
    pub purity: f64,
    pub features: f64,
    pub size: f64,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        (self.popularity + self.recency + self.purity + self.features + self.size).clamp(0.0, 100.0)
    }
}

/// Fraction of source bytes written in `target`, compared case-insensitively.
///
/// Returns 0 when the histogram is empty or all counts are zero.
#[must_use]
pub fn target_language_fraction(histogram: &LanguageHistogram, target: &str) -> f64 {
    let total: u64 = histogram.values().sum();
    if total == 0 {
        return 0.0;
    }

    let target_bytes: u64 = histogram
        .iter()
        .filter(|(language, _)| language.eq_ignore_ascii_case(target))
        .map(|(_, bytes)| *bytes)
        .sum();

    #[expect(clippy::cast_precision_loss, reason = "byte counts far below 2^52")]
    let fraction = target_bytes as f64 / total as f64;

    fraction.clamp(0.0, 1.0)
}

/// Score a metadata snapshot as of `now`.
#[must_use]
pub fn score(meta: &RepoMetadata, target_language_fraction: f64, now: DateTime<Utc>, config: &ScoringConfig) -> ScoreBreakdown {
    ScoreBreakdown {
        popularity: f64::from(meta.stars).sqrt().min(MAX_POPULARITY),
        recency: recency_points(meta.updated_at, now),
        purity: MAX_PURITY * target_language_fraction.clamp(0.0, 1.0),
        features: feature_points(meta),
        size: size_points(meta.size_kb, config),
    }
}

fn recency_points(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    // an update time in the future counts as "just now"
    let days = now.signed_duration_since(updated_at).num_days().max(0);

    match days {
        0..30 => 20.0,
        30..90 => 15.0,
        90..365 => 10.0,
        _ => 0.0,
    }
}

fn feature_points(meta: &RepoMetadata) -> f64 {
    let mut points = 0.0;
    if meta.has_wiki {
        points += 3.0;
    }
    if meta.has_issues {
        points += 3.0;
    }
    if meta.has_description {
        points += 4.0;
    }
    points
}

fn size_points(size_kb: u64, config: &ScoringConfig) -> f64 {
    if size_kb < config.sweet_spot_min_kb {
        2.0
    } else if size_kb <= config.sweet_spot_max_kb {
        10.0
    } else {
        0.0
    }
}
