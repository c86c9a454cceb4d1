use super::CloneFailureClass;
use crate::harvest::{RepoId, RepositoryRecord};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why a clone did not produce a usable checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneFailure {
    pub class: CloneFailureClass,
    pub message: String,

    /// Clone attempts made before giving up (zero when git never ran)
    pub attempts: u32,
}

/// Result of acquiring one repository.
///
/// Either a success with a local path or a failure with a [`CloneFailure`], never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneOutcome {
    #[serde(rename = "repository")]
    record: Arc<RepositoryRecord>,
    success: bool,
    local_path: Option<PathBuf>,
    failure: Option<CloneFailure>,
    #[serde(rename = "clone_time_secs", with = "secs_f64")]
    elapsed: Duration,
    size_mb: f64,
    short_circuited: bool,
}

impl CloneOutcome {
    #[must_use]
    pub const fn succeeded(
        record: Arc<RepositoryRecord>,
        local_path: PathBuf,
        elapsed: Duration,
        size_mb: f64,
        short_circuited: bool,
    ) -> Self {
        Self {
            record,
            success: true,
            local_path: Some(local_path),
            failure: None,
            elapsed,
            size_mb,
            short_circuited,
        }
    }

    #[must_use]
    pub const fn failed(record: Arc<RepositoryRecord>, failure: CloneFailure, elapsed: Duration) -> Self {
        Self {
            record,
            success: false,
            local_path: None,
            failure: Some(failure),
            elapsed,
            size_mb: 0.0,
            short_circuited: false,
        }
    }

    #[must_use]
    pub const fn record(&self) -> &Arc<RepositoryRecord> {
        &self.record
    }

    #[must_use]
    pub fn id(&self) -> &RepoId {
        self.record.id()
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&CloneFailure> {
        self.failure.as_ref()
    }

    /// Time spent cloning; zero when an existing clone was reused.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub const fn size_mb(&self) -> f64 {
        self.size_mb
    }

    /// True when an existing clone was reused without running git.
    #[must_use]
    pub const fn short_circuited(&self) -> bool {
        self.short_circuited
    }
}

/// Order outcomes successes first, then by repository id.
pub fn sort_outcomes(outcomes: &mut [CloneOutcome]) {
    outcomes.sort_by(|a, b| b.success.cmp(&a.success).then_with(|| a.id().cmp(b.id())));
}

mod secs_f64 {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
