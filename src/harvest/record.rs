use super::forge::{LanguageHistogram, RepositoryDetail};
use super::{RepoId, ScoringConfig, score, target_language_fraction};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Snapshot of a repository's metadata at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[expect(clippy::struct_excessive_bools, reason = "flags mirror the repository settings")]
pub struct RepoMetadata {
    #[serde(rename = "full_name")]
    pub id: RepoId,
    pub description: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub size_kb: u64,
    pub language: Option<String>,
    pub languages: LanguageHistogram,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub clone_url: Url,
    pub html_url: Url,
    pub archived: bool,
    pub has_wiki: bool,
    pub has_issues: bool,
    pub has_description: bool,
}

impl RepoMetadata {
    /// Normalize the API representation of a repository.
    pub fn from_detail(detail: RepositoryDetail, languages: LanguageHistogram) -> Result<Self> {
        let id = RepoId::parse(&detail.full_name)?;
        let has_description = detail.description.as_deref().is_some_and(|d| !d.trim().is_empty());

        Ok(Self {
            id,
            description: detail.description,
            stars: detail.stargazers_count,
            forks: detail.forks_count,
            size_kb: detail.size,
            language: detail.language,
            languages,
            created_at: detail.created_at,
            updated_at: detail.updated_at,
            clone_url: detail.clone_url,
            html_url: detail.html_url,
            archived: detail.archived,
            has_wiki: detail.has_wiki,
            has_issues: detail.has_issues,
            has_description,
        })
    }
}

/// A discovered repository together with the values derived from it at discovery time.
///
/// Records are never mutated after construction; the derived fields are a pure
/// function of the metadata snapshot and the `now` passed to [`RepositoryRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    #[serde(flatten)]
    metadata: RepoMetadata,
    target_language_fraction: f64,
    quality_score: f64,
}

impl RepositoryRecord {
    #[must_use]
    pub fn new(metadata: RepoMetadata, target_language: &str, scoring: &ScoringConfig, now: DateTime<Utc>) -> Self {
        let fraction = target_language_fraction(&metadata.languages, target_language);
        let quality_score = score(&metadata, fraction, now, scoring).total();

        Self {
            metadata,
            target_language_fraction: fraction,
            quality_score,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &RepoId {
        &self.metadata.id
    }

    #[must_use]
    pub const fn metadata(&self) -> &RepoMetadata {
        &self.metadata
    }

    #[must_use]
    pub const fn stars(&self) -> u32 {
        self.metadata.stars
    }

    #[must_use]
    pub const fn forks(&self) -> u32 {
        self.metadata.forks
    }

    #[must_use]
    pub const fn size_kb(&self) -> u64 {
        self.metadata.size_kb
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.metadata.updated_at
    }

    #[must_use]
    pub const fn clone_url(&self) -> &Url {
        &self.metadata.clone_url
    }

    #[must_use]
    pub const fn archived(&self) -> bool {
        self.metadata.archived
    }

    /// Fraction of source bytes written in the target language, in `[0, 1]`.
    #[must_use]
    pub const fn target_language_fraction(&self) -> f64 {
        self.target_language_fraction
    }

    /// Quality score in `[0, 100]`.
    #[must_use]
    pub const fn quality_score(&self) -> f64 {
        self.quality_score
    }
}
