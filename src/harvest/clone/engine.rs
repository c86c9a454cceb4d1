use super::{CloneFailure, CloneFailureClass, CloneOutcome, GitBackend, GitRun, ProcessGit, classify, sort_outcomes};
use crate::Result;
use crate::harvest::{CloneStats, Progress, RepositoryRecord};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use walkdir::WalkDir;

const LOG_TARGET: &str = "       clone";

/// Statistics are logged every this many finished repositories.
const STATS_INTERVAL: u64 = 10;

/// Worker pool size and retry policy for cloning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloneSettings {
    /// Number of clones allowed to run at once
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Clone attempts per repository
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` is followed by `n` times this.
    /// Zero disables the wait entirely.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Limit for one `git clone` run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_workers() -> usize {
    4
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    2
}

const fn default_timeout_secs() -> u64 {
    600
}

impl Default for CloneSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CloneSettings {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(app_err!("clone.workers must be at least 1"));
        }

        if self.max_retries == 0 {
            return Err(app_err!("clone.max_retries must be at least 1"));
        }

        if self.timeout_secs == 0 {
            return Err(app_err!("clone.timeout_secs must be at least 1"));
        }

        Ok(())
    }
}

/// Shallow-clones repositories into `<clone_root>/<owner>/<name>` on a bounded pool of tasks.
pub struct CloneEngine<G: GitBackend = ProcessGit> {
    git: Arc<G>,
    clone_root: PathBuf,
    settings: CloneSettings,
    progress: Option<Arc<dyn Progress>>,
}

impl CloneEngine {
    /// Create an engine that runs the system `git`.
    #[must_use]
    pub fn new(clone_root: impl Into<PathBuf>, settings: CloneSettings) -> Self {
        let git = ProcessGit::new(settings.timeout());
        Self::with_backend(git, clone_root, settings)
    }
}

impl<G: GitBackend> CloneEngine<G> {
    #[must_use]
    pub fn with_backend(git: G, clone_root: impl Into<PathBuf>, settings: CloneSettings) -> Self {
        Self {
            git: Arc::new(git),
            clone_root: clone_root.into(),
            settings,
            progress: None,
        }
    }

    /// Report progress of [`Self::clone_all`] through `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn clone_root(&self) -> &Path {
        &self.clone_root
    }

    #[must_use]
    pub const fn settings(&self) -> &CloneSettings {
        &self.settings
    }

    /// Clone every record, running at most `workers` clones at once.
    ///
    /// Returns exactly one outcome per record, successes first and then ordered by id.
    /// A task that panics yields a failed outcome for its record.
    pub async fn clone_all(&self, records: Vec<Arc<RepositoryRecord>>, workers: usize, force_refresh: bool) -> Vec<CloneOutcome> {
        let total = records.len();
        log::info!(target: LOG_TARGET, "Cloning {total} repositories with {workers} workers");

        let finished = Arc::new(AtomicU64::new(0));
        if let Some(progress) = &self.progress {
            progress.set_phase("Cloning");
            let finished = Arc::clone(&finished);
            let total = total as u64;
            progress.set_determinate(Box::new(move || {
                let done = finished.load(Ordering::Relaxed);
                (total, done, format!("{done}/{total} repositories"))
            }));
        }

        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);

        for record in records {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let task_record = Arc::clone(&record);

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                engine.clone_repository(task_record, force_refresh).await
            });

            let _ = pending.insert(handle.id(), record);
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut stats = CloneStats::default();

        while let Some(joined) = tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((task_id, outcome)) => {
                    let _ = pending.remove(&task_id);
                    outcome
                }
                Err(e) => {
                    let record = pending.remove(&e.id()).expect("every task has a pending record");
                    log::error!(target: LOG_TARGET, "Clone task for {} failed: {e}", record.id());
                    let failure = CloneFailure {
                        class: CloneFailureClass::Other,
                        message: format!("clone task failed: {e}"),
                        attempts: 0,
                    };
                    CloneOutcome::failed(record, failure, Duration::ZERO)
                }
            };

            stats.record(&outcome);
            outcomes.push(outcome);

            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            if done % STATS_INTERVAL == 0 {
                log::info!(target: LOG_TARGET, "Progress {done}/{total}: {stats}");
            }
        }

        if let Some(progress) = &self.progress {
            progress.done();
        }

        log::info!(target: LOG_TARGET, "Cloning finished: {stats}");

        sort_outcomes(&mut outcomes);
        outcomes
    }

    /// Acquire one repository, reusing an existing clone unless `force_refresh` is set.
    pub async fn clone_repository(&self, record: Arc<RepositoryRecord>, force_refresh: bool) -> CloneOutcome {
        let dest = record.id().clone_path(&self.clone_root);

        if !force_refresh && dest.join(".git").exists() {
            log::debug!(target: LOG_TARGET, "{}: already cloned, reusing '{}'", record.id(), dest.display());
            let size_mb = directory_size_mb(dest.clone()).await;
            return CloneOutcome::succeeded(record, dest, Duration::ZERO, size_mb, true);
        }

        // stale or forced: the destination must not exist when git starts
        if let Err(e) = remove_path(&dest).await {
            return local_failure(record, &e, 0);
        }

        if let Some(parent) = dest.parent()
            && let Err(e) = create_dir_all(parent).await
        {
            return local_failure(record, &e, 0);
        }

        let max_attempts = self.settings.max_retries.max(1);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            log::debug!(target: LOG_TARGET, "{}: clone attempt {attempt}/{max_attempts}", record.id());

            let (class, message) = match self.git.shallow_clone(record.clone_url(), &dest).await {
                Ok(GitRun::Exited { success: true, .. }) if dest.join(".git").exists() => {
                    let size_mb = directory_size_mb(dest.clone()).await;
                    log::info!(target: LOG_TARGET, "Cloned {} ({size_mb:.1} MiB)", record.id());
                    return CloneOutcome::succeeded(record, dest, start.elapsed(), size_mb, false);
                }
                Ok(GitRun::Exited { success: true, .. }) => (
                    CloneFailureClass::Incomplete,
                    "git reported success but left no .git directory".to_string(),
                ),
                Ok(GitRun::Exited { success: false, stderr }) => (classify(&stderr), stderr.trim().to_string()),
                Ok(GitRun::TimedOut(limit)) => (
                    CloneFailureClass::Timeout,
                    format!("git clone did not finish within {}s", limit.as_secs()),
                ),
                Err(e) => (CloneFailureClass::Other, e.to_string()),
            };

            if let Err(e) = remove_path(&dest).await {
                return local_failure(record, &e, attempt);
            }

            if !class.is_retryable() || attempt >= max_attempts {
                log::warn!(target: LOG_TARGET, "Failed to clone {} after {attempt} attempt(s) [{class}]: {message}", record.id());
                let failure = CloneFailure {
                    class,
                    message,
                    attempts: attempt,
                };
                return CloneOutcome::failed(record, failure, start.elapsed());
            }

            let delay = self.settings.retry_delay() * attempt;
            log::debug!(
                target: LOG_TARGET,
                "{}: attempt {attempt} failed [{class}], retrying in {}s",
                record.id(),
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl<G: GitBackend> Clone for CloneEngine<G> {
    fn clone(&self) -> Self {
        Self {
            git: Arc::clone(&self.git),
            clone_root: self.clone_root.clone(),
            settings: self.settings.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<G: GitBackend> Debug for CloneEngine<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CloneEngine")
            .field("git", &self.git)
            .field("clone_root", &self.clone_root)
            .field("settings", &self.settings)
            .field("progress", &self.progress.as_ref().map(|_| "<progress>"))
            .finish()
    }
}

fn local_failure(record: Arc<RepositoryRecord>, error: &ohno::AppError, attempts: u32) -> CloneOutcome {
    log::warn!(target: LOG_TARGET, "Cannot clone {}: {error}", record.id());
    let failure = CloneFailure {
        class: CloneFailureClass::LocalResource,
        message: error.to_string(),
        attempts,
    };
    CloneOutcome::failed(record, failure, Duration::ZERO)
}

/// Remove a file or directory tree; a missing path is not an error.
async fn remove_path(path: &Path) -> Result<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || match std::fs::symlink_metadata(&target) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&target),
        Ok(_) => std::fs::remove_file(&target),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    })
    .await
    .into_app_err("removal task failed")?
    .into_app_err_with(|| format!("unable to remove '{}'", path.display()))
}

async fn create_dir_all(path: &Path) -> Result<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || std::fs::create_dir_all(&target))
        .await
        .into_app_err("directory creation task failed")?
        .into_app_err_with(|| format!("unable to create directory '{}'", path.display()))
}

/// Total size of the regular files under `path`, in MiB.
#[expect(clippy::cast_precision_loss, reason = "sizes are reported with one decimal")]
async fn directory_size_mb(path: PathBuf) -> f64 {
    tokio::task::spawn_blocking(move || {
        let bytes: u64 = WalkDir::new(&path)
            .into_iter()
            .filter_map(core::result::Result::ok)
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum();

        bytes as f64 / (1024.0 * 1024.0)
    })
    .await
    .unwrap_or(0.0)
}
