use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `harvest.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    validate_with_fallback(host, args.config.as_deref(), Utf8Path::new(DEFAULT_CONFIG_FILE))
}

fn validate_with_fallback<H: Host>(host: &mut H, config_path: Option<&Utf8Path>, fallback: &Utf8Path) -> Result<()> {
    match Config::load_with_fallback(config_path, fallback) {
        Ok((config, source)) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = source {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else {
                let _ = writeln!(host.output(), "Using default configuration (no config file found)");
            }
            let _ = writeln!(
                host.output(),
                "{} seed repositories, {} search queries, target language {}",
                config.seeds.len(),
                config.queries.len(),
                config.discovery.target_language
            );
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::commands::init::{InitArgs, init_config};

    fn write_config(dir: &tempfile::TempDir, name: &str, text: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from(dir.path().to_string_lossy().to_string()).join(name);
        std::fs::write(&path, text).expect("Failed to write test config");
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = Utf8PathBuf::from(temp_dir.path().to_string_lossy().to_string()).join("harvest.toml");

        let mut init_host = TestHost::new();
        init_config(&mut init_host, &InitArgs { output: config_path.clone() }).expect("init_config should succeed");
        assert!(init_host.output_text().contains("Generated default configuration file"));

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(config_path) });

        assert!(result.is_ok(), "Default configuration should validate successfully: {result:?}");
        assert!(host.output_text().starts_with("Configuration file is valid\n"));
        assert!(host.output_text().contains("29 seed repositories, 7 search queries, target language Erlang"));
        assert_eq!(host.exit_code, None);
    }

    #[test]
    fn test_reports_implicitly_loaded_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let fallback = write_config(&temp_dir, "harvest.toml", "queries = [\"language:erlang\"]\n");

        let mut host = TestHost::new();
        validate_with_fallback(&mut host, None, &fallback).expect("implicit config should validate");

        assert!(host.output_text().contains(&format!("Config file: {fallback}")), "{}", host.output_text());
        assert!(!host.output_text().contains("Using default configuration"));
        assert!(host.output_text().contains("0 seed repositories, 1 search queries"));
    }

    #[test]
    fn test_reports_embedded_defaults_without_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let fallback = Utf8PathBuf::from(temp_dir.path().to_string_lossy().to_string()).join("harvest.toml");

        let mut host = TestHost::new();
        validate_with_fallback(&mut host, None, &fallback).expect("embedded defaults should validate");

        assert!(host.output_text().contains("Using default configuration (no config file found)"));
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = write_config(&temp_dir, "invalid_syntax.toml", "[discovery\nmax_repositories = 5\n");

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(config_path) });

        assert!(result.is_err(), "Invalid TOML syntax should fail validation");
        assert!(host.error_text().starts_with("❌ Configuration validation failed:"));
        assert_eq!(host.exit_code, Some(1));
    }

    #[test]
    fn test_unknown_field() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = write_config(&temp_dir, "unknown_field.toml", "queries = [\"language:erlang\"]\nunknown_field = \"value\"\n");

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(config_path) });

        assert!(result.is_err(), "Unknown field should fail validation");
        assert_eq!(host.exit_code, Some(1));
    }

    #[test]
    fn test_no_seeds_or_queries() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = write_config(&temp_dir, "empty.toml", "seeds = []\nqueries = []\n");

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(config_path) });

        let message = result.expect_err("empty seeds and queries should fail").to_string();
        assert!(message.contains("at least one seed repository or search query"), "{message}");
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = Utf8PathBuf::from(temp_dir.path().to_string_lossy().to_string()).join("missing.toml");

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(config_path) });

        assert!(result.is_err());
        assert_eq!(host.exit_code, Some(1));
    }
}
