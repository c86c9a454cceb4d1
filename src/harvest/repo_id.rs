use crate::Result;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Identity of a hosted repository: an `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: Arc<str>,
    name: Arc<str>,
}

impl RepoId {
    /// Parse `owner/name`, `owner/name.git`, or a repository URL such as
    /// `https://github.com/owner/name`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        let path = if text.contains("://") {
            let url = Url::parse(text).into_app_err_with(|| format!("invalid repository URL '{text}'"))?;
            url.path().trim_matches('/').to_string()
        } else {
            text.trim_matches('/').to_string()
        };

        let mut segments = path.split('/');
        let (Some(owner), Some(name), None) = (segments.next(), segments.next(), segments.next()) else {
            bail!("invalid repository '{text}': expected 'owner/name'");
        };

        let name = name.strip_suffix(".git").unwrap_or(name);

        if !is_valid_component(owner) || !is_valid_component(name) {
            bail!("invalid repository '{text}': owner and name may only contain letters, digits, '-', '_' and '.'");
        }

        Ok(Self {
            owner: Arc::from(owner),
            name: Arc::from(name),
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where this repository is cloned: `<root>/<owner>/<name>`.
    ///
    /// Components are validated on parse to be plain file names, so distinct ids
    /// never share a path.
    #[must_use]
    pub fn clone_path(&self, root: &Path) -> PathBuf {
        root.join(&*self.owner).join(&*self.name)
    }
}

/// A component must be usable verbatim as a single path segment.
fn is_valid_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_name() {
        let id = RepoId::parse("ninenines/cowboy").unwrap();
        assert_eq!(id.owner(), "ninenines");
        assert_eq!(id.name(), "cowboy");
        assert_eq!(id.to_string(), "ninenines/cowboy");
    }

    #[test]
    fn test_parse_strips_git_suffix() {
        let id = RepoId::parse("erlang/otp.git").unwrap();
        assert_eq!(id.name(), "otp");
    }

    #[test]
    fn test_parse_url() {
        let id = RepoId::parse("https://github.com/rabbitmq/rabbitmq-server.git").unwrap();
        assert_eq!(id.to_string(), "rabbitmq/rabbitmq-server");

        let id = RepoId::parse("https://github.com/emqx/emqx/").unwrap();
        assert_eq!(id.to_string(), "emqx/emqx");
    }

    #[test]
    fn test_parse_keeps_dots_in_names() {
        let id = RepoId::parse("owner/.github").unwrap();
        assert_eq!(id.name(), ".github");

        let id = RepoId::parse("owner/my.repo").unwrap();
        assert_eq!(id.name(), "my.repo");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(RepoId::parse("cowboy").is_err());
        assert!(RepoId::parse("a/b/c").is_err());
        assert!(RepoId::parse("/cowboy").is_err());
        assert!(RepoId::parse("owner/").is_err());
        assert!(RepoId::parse("").is_err());
        assert!(RepoId::parse("https://github.com/only-owner").is_err());
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        assert!(RepoId::parse("../etc").is_err());
        assert!(RepoId::parse("owner/..").is_err());
        assert!(RepoId::parse("owner/.").is_err());
        assert!(RepoId::parse("own er/name").is_err());
        assert!(RepoId::parse("owner/na:me").is_err());
        assert!(RepoId::parse(r"owner/na\me").is_err());
    }

    #[test]
    fn test_from_str() {
        let id: RepoId = "processone/ejabberd".parse().unwrap();
        assert_eq!(id.owner(), "processone");
    }

    #[test]
    fn test_ordering_is_by_owner_then_name() {
        let mut ids = vec![
            RepoId::parse("b/a").unwrap(),
            RepoId::parse("a/z").unwrap(),
            RepoId::parse("a/b").unwrap(),
        ];
        ids.sort();
        let rendered: Vec<_> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["a/b", "a/z", "b/a"]);
    }

    #[test]
    fn test_serde_as_string() {
        let id = RepoId::parse("erlang/otp").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""erlang/otp""#);

        let back: RepoId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let invalid: core::result::Result<RepoId, _> = serde_json::from_str(r#""not-an-id""#);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_clone_path() {
        let root = Path::new("/corpus");
        let id = RepoId::parse("erlang/otp").unwrap();
        assert_eq!(id.clone_path(root), PathBuf::from("/corpus/erlang/otp"));
    }

    #[test]
    fn test_distinct_ids_have_distinct_paths() {
        let root = Path::new("/corpus");
        let a = RepoId::parse("a-b/c").unwrap();
        let b = RepoId::parse("a/b-c").unwrap();
        assert_ne!(a.clone_path(root), b.clone_path(root));
    }
}
