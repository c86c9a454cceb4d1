use super::RepositoryRecord;
use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use ohno::app_err;
use serde::{Deserialize, Serialize};

/// Thresholds a discovered repository must meet to join the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptanceCriteria {
    #[serde(default = "default_min_stars")]
    pub min_stars: u32,

    #[serde(default = "default_min_size_kb")]
    pub min_size_kb: u64,

    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Minimum fraction of source bytes in the target language, in `[0, 1]`
    #[serde(default = "default_min_language_fraction")]
    pub min_language_fraction: f64,

    /// Reject repositories with more than twice as many forks as stars
    #[serde(default = "default_true")]
    pub exclude_forks: bool,

    #[serde(default)]
    pub include_archived: bool,

    /// Reject repositories not updated within this many 30-day months
    #[serde(default = "default_recent_activity_months")]
    pub recent_activity_months: u32,
}

const fn default_min_stars() -> u32 {
    10
}

const fn default_min_size_kb() -> u64 {
    100
}

const fn default_max_size_mb() -> u64 {
    500
}

const fn default_min_language_fraction() -> f64 {
    0.5
}

const fn default_true() -> bool {
    true
}

const fn default_recent_activity_months() -> u32 {
    12
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        Self {
            min_stars: default_min_stars(),
            min_size_kb: default_min_size_kb(),
            max_size_mb: default_max_size_mb(),
            min_language_fraction: default_min_language_fraction(),
            exclude_forks: default_true(),
            include_archived: false,
            recent_activity_months: default_recent_activity_months(),
        }
    }
}

/// Why a repository was turned away.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooFewStars { stars: u32, min: u32 },
    TooSmall { size_kb: u64, min_kb: u64 },
    TooLarge { size_kb: u64, max_kb: u64 },
    LowLanguageFraction { fraction: f64, min: f64 },
    LikelyFork { forks: u32, stars: u32 },
    Archived,
    Inactive { days_since_update: i64, max_days: i64 },
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooFewStars { stars, min } => write!(f, "{stars} stars, fewer than the required {min}"),
            Self::TooSmall { size_kb, min_kb } => write!(f, "{size_kb} KiB, smaller than {min_kb} KiB"),
            Self::TooLarge { size_kb, max_kb } => write!(f, "{size_kb} KiB, larger than {max_kb} KiB"),
            Self::LowLanguageFraction { fraction, min } => {
                write!(f, "{:.1}% target language, below {:.1}%", fraction * 100.0, min * 100.0)
            }
            Self::LikelyFork { forks, stars } => write!(f, "likely a fork ({forks} forks for {stars} stars)"),
            Self::Archived => write!(f, "archived"),
            Self::Inactive { days_since_update, max_days } => {
                write!(f, "last updated {days_since_update} days ago, more than {max_days} days")
            }
        }
    }
}

impl AcceptanceCriteria {
    /// Check a record against every filter, in a fixed order, returning the first failure.
    pub fn evaluate(&self, record: &RepositoryRecord, now: DateTime<Utc>) -> Result<(), Rejection> {
        if record.stars() < self.min_stars {
            return Err(Rejection::TooFewStars {
                stars: record.stars(),
                min: self.min_stars,
            });
        }

        if record.size_kb() < self.min_size_kb {
            return Err(Rejection::TooSmall {
                size_kb: record.size_kb(),
                min_kb: self.min_size_kb,
            });
        }

        let max_kb = self.max_size_mb.saturating_mul(1024);
        if record.size_kb() > max_kb {
            return Err(Rejection::TooLarge {
                size_kb: record.size_kb(),
                max_kb,
            });
        }

        if record.target_language_fraction() < self.min_language_fraction {
            return Err(Rejection::LowLanguageFraction {
                fraction: record.target_language_fraction(),
                min: self.min_language_fraction,
            });
        }

        if self.exclude_forks && u64::from(record.forks()) > 2 * u64::from(record.stars()) {
            return Err(Rejection::LikelyFork {
                forks: record.forks(),
                stars: record.stars(),
            });
        }

        if record.archived() && !self.include_archived {
            return Err(Rejection::Archived);
        }

        let max_days = i64::from(self.recent_activity_months) * 30;
        let since_update = now.signed_duration_since(record.updated_at());
        if since_update > chrono::Duration::days(max_days) {
            return Err(Rejection::Inactive {
                days_since_update: since_update.num_days(),
                max_days,
            });
        }

        Ok(())
    }

    /// Validate threshold values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_language_fraction) {
            return Err(app_err!(
                "min_language_fraction must be between 0 and 1, got {}",
                self.min_language_fraction
            ));
        }

        if self.min_size_kb > self.max_size_mb.saturating_mul(1024) {
            return Err(app_err!(
                "min_size_kb ({}) must not exceed max_size_mb ({}) expressed in KiB",
                self.min_size_kb,
                self.max_size_mb
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::ScoringConfig;
    use crate::harvest::record::test_support::{metadata, now};
    use crate::harvest::{LanguageHistogram, RepoMetadata};

    fn record(modify: impl FnOnce(&mut RepoMetadata)) -> RepositoryRecord {
        let mut meta = metadata("erlang/otp");
        modify(&mut meta);
        RepositoryRecord::new(meta, "Erlang", &ScoringConfig::default(), now())
    }

    fn evaluate(modify: impl FnOnce(&mut RepoMetadata)) -> Result<(), Rejection> {
        AcceptanceCriteria::default().evaluate(&record(modify), now())
    }

    #[test]
    fn test_healthy_repository_is_accepted() {
        assert_eq!(evaluate(|_| {}), Ok(()));
    }

    #[test]
    fn test_too_few_stars() {
        assert_eq!(evaluate(|m| m.stars = 9), Err(Rejection::TooFewStars { stars: 9, min: 10 }));
        assert_eq!(
            evaluate(|m| {
                m.stars = 10;
                m.forks = 5;
            }),
            Ok(())
        );
    }

    #[test]
    fn test_size_bounds() {
        assert_eq!(evaluate(|m| m.size_kb = 99), Err(Rejection::TooSmall { size_kb: 99, min_kb: 100 }));
        assert_eq!(evaluate(|m| m.size_kb = 512_000), Ok(()));
        assert_eq!(
            evaluate(|m| m.size_kb = 512_001),
            Err(Rejection::TooLarge {
                size_kb: 512_001,
                max_kb: 512_000
            })
        );
    }

    #[test]
    fn test_low_language_fraction() {
        let result = evaluate(|m| m.languages = LanguageHistogram::from([("Erlang".to_string(), 4), ("C".to_string(), 6)]));
        assert!(matches!(result, Err(Rejection::LowLanguageFraction { .. })));

        let result = evaluate(|m| m.languages = LanguageHistogram::new());
        assert!(matches!(result, Err(Rejection::LowLanguageFraction { .. })));
    }

    #[test]
    fn test_likely_fork() {
        assert_eq!(
            evaluate(|m| {
                m.stars = 10;
                m.forks = 21;
            }),
            Err(Rejection::LikelyFork { forks: 21, stars: 10 })
        );
        assert_eq!(
            evaluate(|m| {
                m.stars = 10;
                m.forks = 20;
            }),
            Ok(())
        );

        let criteria = AcceptanceCriteria {
            exclude_forks: false,
            ..AcceptanceCriteria::default()
        };
        let rec = record(|m| m.forks = 10_000);
        assert_eq!(criteria.evaluate(&rec, now()), Ok(()));
    }

    #[test]
    fn test_archived() {
        assert_eq!(evaluate(|m| m.archived = true), Err(Rejection::Archived));

        let criteria = AcceptanceCriteria {
            include_archived: true,
            ..AcceptanceCriteria::default()
        };
        assert_eq!(criteria.evaluate(&record(|m| m.archived = true), now()), Ok(()));
    }

    #[test]
    fn test_inactive() {
        assert_eq!(evaluate(|m| m.updated_at = now() - chrono::Duration::days(360)), Ok(()));
        assert_eq!(
            evaluate(|m| m.updated_at = now() - chrono::Duration::days(361)),
            Err(Rejection::Inactive {
                days_since_update: 361,
                max_days: 360
            })
        );
    }

    #[test]
    fn test_rejections_are_checked_in_order() {
        // fails both the star and the archive filter; stars come first
        assert!(matches!(
            evaluate(|m| {
                m.stars = 1;
                m.archived = true;
            }),
            Err(Rejection::TooFewStars { .. })
        ));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::Archived.to_string(), "archived");
        assert_eq!(
            Rejection::TooFewStars { stars: 3, min: 10 }.to_string(),
            "3 stars, fewer than the required 10"
        );
        assert_eq!(
            Rejection::LowLanguageFraction { fraction: 0.25, min: 0.5 }.to_string(),
            "25.0% target language, below 50.0%"
        );
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let criteria: AcceptanceCriteria = toml::from_str("").unwrap();
        assert_eq!(criteria, AcceptanceCriteria::default());
        criteria.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let criteria = AcceptanceCriteria {
            min_language_fraction: 1.5,
            ..AcceptanceCriteria::default()
        };
        assert!(criteria.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_size_range() {
        let criteria = AcceptanceCriteria {
            min_size_kb: 2048,
            max_size_mb: 1,
            ..AcceptanceCriteria::default()
        };
        assert!(criteria.validate().is_err());
    }
}
