use crate::Result;
use crate::harvest::{AcceptanceCriteria, CloneSettings, DiscoverySettings, RateLimitConfig, RepoId, ScoringConfig};
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Configuration file looked up in the current directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "harvest.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory receiving the JSON outputs
    #[serde(default = "default_output_dir")]
    pub output_dir: Utf8PathBuf,

    /// Directory receiving the clones
    #[serde(default = "default_clone_dir")]
    pub clone_dir: Utf8PathBuf,

    /// Fail instead of running anonymously when no GitHub token is available
    #[serde(default)]
    pub require_token: bool,

    /// Repositories always considered during discovery
    #[serde(default)]
    pub seeds: Vec<RepoId>,

    /// GitHub search queries
    #[serde(default)]
    pub queries: Vec<String>,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub criteria: AcceptanceCriteria,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub clone: CloneSettings,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("output")
}

fn default_clone_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("cloned_repos")
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `harvest.toml` in the current directory is used when
    /// present and the embedded defaults otherwise.
    pub fn load(config_path: Option<&Utf8Path>) -> Result<Self> {
        Self::load_with_fallback(config_path, Utf8Path::new(DEFAULT_CONFIG_FILE)).map(|(config, _)| config)
    }

    /// Load configuration from `config_path`, or from `fallback` when no path is given and it exists.
    ///
    /// Also returns the file that was read, `None` when the embedded defaults were used.
    pub(super) fn load_with_fallback(config_path: Option<&Utf8Path>, fallback: &Utf8Path) -> Result<(Self, Option<Utf8PathBuf>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            match fs::read_to_string(fallback) {
                Ok(text) => (fallback.to_path_buf(), text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Self::default(), None)),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{fallback}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok((config, Some(final_path)))
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.seeds.is_empty() && self.queries.is_empty() {
            return Err(app_err!("at least one seed repository or search query is required"));
        }

        if let Some(query) = self.queries.iter().find(|q| q.trim().is_empty()) {
            return Err(app_err!("search queries must not be empty, got '{query}'"));
        }

        self.discovery.validate()?;
        self.criteria.validate()?;
        self.scoring.validate()?;
        self.clone.validate()?;
        self.rate_limit.validate()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text).into_app_err("parsing test configuration")?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn test_default_config_contents() {
        let config = Config::default();
        assert_eq!(config.seeds.len(), 29);
        assert_eq!(config.queries.len(), 7);
        assert!(config.seeds.contains(&RepoId::parse("erlang/otp").unwrap()));
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.clone_dir, "cloned_repos");
        assert!(!config.require_token);
    }

    #[test]
    fn test_embedded_sections_match_type_defaults() {
        let config = Config::default();
        assert_eq!(config.discovery, DiscoverySettings::default());
        assert_eq!(config.criteria, AcceptanceCriteria::default());
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.clone, CloneSettings::default());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_sections_are_optional() {
        let config = parse(r#"seeds = ["erlang/otp"]"#).unwrap();
        assert_eq!(config.clone, CloneSettings::default());
        assert!(config.queries.is_empty());
    }

    #[test]
    fn test_nothing_to_discover() {
        let result = parse("queries = []");
        assert!(result.unwrap_err().to_string().contains("at least one seed"));
    }

    #[test]
    fn test_blank_query() {
        assert!(parse(r#"queries = ["  "]"#).is_err());
    }

    #[test]
    fn test_invalid_seed() {
        assert!(parse(r#"seeds = ["not-a-repo"]"#).is_err());
    }

    #[test]
    fn test_unknown_field() {
        assert!(parse("seeds = [\"a/b\"]\ncolour = \"blue\"").is_err());
        assert!(parse("seeds = [\"a/b\"]\n[clone]\nthreads = 3").is_err());
    }

    #[test]
    fn test_section_validation_is_applied() {
        assert!(parse("seeds = [\"a/b\"]\n[clone]\nworkers = 0").is_err());
        assert!(parse("seeds = [\"a/b\"]\n[rate_limit]\nbuffer = 1.0").is_err());
        assert!(parse("seeds = [\"a/b\"]\n[criteria]\nmin_language_fraction = -0.1").is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_load_and_save_default() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("harvest.toml")).expect("UTF-8 temp path");

        Config::save_default(&path).unwrap();
        let loaded = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("absent.toml")).expect("UTF-8 temp path");

        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(err.to_string().contains("reading configuration file"));
    }
}
