//! Concurrent shallow cloning with classified retry.

mod classify;
mod engine;
mod git;
mod outcome;

pub use classify::{CloneFailureClass, classify};
pub use engine::{CloneEngine, CloneSettings};
pub use git::{CLONE_TIMEOUT, GitBackend, GitRun, ProcessGit};
pub use outcome::{CloneFailure, CloneOutcome, sort_outcomes};
