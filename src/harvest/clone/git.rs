use crate::Result;
use core::fmt::Debug;
use core::time::Duration;
use ohno::IntoAppError;
use std::path::Path;
use tokio::process::Command;
use url::Url;

/// Default limit for a single clone.
pub const CLONE_TIMEOUT: Duration = Duration::from_mins(10);

/// How a git invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRun {
    /// git ran to completion
    Exited { success: bool, stderr: String },

    /// git was killed after running for the given duration
    TimedOut(Duration),
}

/// Runs git on behalf of the clone engine.
pub trait GitBackend: Send + Sync + Debug + 'static {
    /// Shallow-clone `url` into `dest`, which must not exist yet.
    ///
    /// Returns an error only when git could not be run at all.
    fn shallow_clone(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<GitRun>> + Send;
}

/// Runs the `git` executable found on the `PATH`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessGit {
    timeout: Duration,
}

impl ProcessGit {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessGit {
    fn default() -> Self {
        Self::new(CLONE_TIMEOUT)
    }
}

impl GitBackend for ProcessGit {
    async fn shallow_clone(&self, url: &Url, dest: &Path) -> Result<GitRun> {
        let dest = dest.to_str().into_app_err("invalid UTF-8 in clone path")?;

        // --depth 1 fetches only the latest commit; no history, no tags, no other branches
        run_git_with_timeout(
            &["clone", "--depth", "1", "--single-branch", "--no-tags", url.as_str(), dest],
            self.timeout,
        )
        .await
    }
}

async fn run_git_with_timeout(args: &[&str], timeout: Duration) -> Result<GitRun> {
    let child = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(GitRun::Exited {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => Ok(GitRun::TimedOut(timeout)),
    }
}
