use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Category of a failed clone, derived from git's error output or the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CloneFailureClass {
    /// The remote repository does not exist or is not accessible
    NotFound,

    /// Name resolution, connection, or transfer problems
    Network,

    /// git did not finish in time
    Timeout,

    /// git reported success but left no usable checkout
    Incomplete,

    /// The local filesystem got in the way (removal or directory creation failed)
    LocalResource,

    /// Anything else
    Other,
}

impl CloneFailureClass {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::NotFound | Self::LocalResource)
    }
}

// GitHub answers a missing or private repository with an authentication prompt,
// which git refuses when terminal prompts are disabled.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "404",
    "does not exist",
    "could not read username",
    "terminal prompts disabled",
];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout"];
const NETWORK_MARKERS: &[&str] = &[
    "network",
    "could not resolve host",
    "connection",
    "early eof",
    "unable to access",
    "rpc failed",
];

/// Classify git's error output.
///
/// Checks run in a fixed order (not found, timeout, network), so output mentioning
/// both a missing repository and a connection problem is treated as not found.
#[must_use]
pub fn classify(stderr: &str) -> CloneFailureClass {
    let text = stderr.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if contains_any(NOT_FOUND_MARKERS) {
        CloneFailureClass::NotFound
    } else if contains_any(TIMEOUT_MARKERS) {
        CloneFailureClass::Timeout
    } else if contains_any(NETWORK_MARKERS) {
        CloneFailureClass::Network
    } else {
        CloneFailureClass::Other
    }
}
