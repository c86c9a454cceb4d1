//! JSON persistence of pipeline results and checkpoints.

use super::RepositoryRecord;
use super::clone::CloneOutcome;
use crate::Result;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use strum::Display;

const LOG_TARGET: &str = "       store";

/// Load a JSON document from a file
pub fn load<T>(path: impl AsRef<Path>, context: impl AsRef<str>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let ctx = context.as_ref();

    let file = File::open(path).into_app_err_with(|| format!("unable to open file '{}'", path.display()))?;

    let reader = BufReader::new(file);
    let data = serde_json::from_reader(reader).into_app_err_with(|| format!("unable to parse file '{}'", path.display()))?;

    log::debug!(target: LOG_TARGET, "Loaded {ctx} from '{}'", path.display());

    Ok(data)
}

/// Load a JSON document, treating a missing or unreadable file as absent.
pub fn load_if_present<T>(path: impl AsRef<Path>, context: impl AsRef<str>) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    if !path.exists() {
        log::debug!(target: LOG_TARGET, "No {} at '{}'", context.as_ref(), path.display());
        return None;
    }

    match load(path, context.as_ref()) {
        Ok(data) => Some(data),
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Ignoring {}: {e:#}", context.as_ref());
            None
        }
    }
}

/// Save a document as pretty-printed JSON, creating parent directories as needed
pub fn save<T>(data: &T, path: impl AsRef<Path>) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let file = File::create(path).into_app_err_with(|| format!("unable to create file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, data).into_app_err_with(|| format!("unable to serialize '{}'", path.display()))?;
    writer.flush().into_app_err_with(|| format!("unable to write file '{}'", path.display()))?;

    log::debug!(target: LOG_TARGET, "Wrote '{}'", path.display());

    Ok(())
}

/// Contents of `repositories.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub discovery_date: DateTime<Utc>,
    pub total_repositories: usize,
    pub repositories: Vec<RepositoryRecord>,
}

impl DiscoveryDocument {
    #[must_use]
    pub const fn new(repositories: Vec<RepositoryRecord>, now: DateTime<Utc>) -> Self {
        Self {
            discovery_date: now,
            total_repositories: repositories.len(),
            repositories,
        }
    }
}

/// Contents of `clone_results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneDocument {
    pub clone_date: DateTime<Utc>,
    pub total_repositories: usize,
    pub successful_clones: usize,
    pub failed_clones: usize,
    pub results: Vec<CloneOutcome>,
}

impl CloneDocument {
    #[must_use]
    pub fn new(results: Vec<CloneOutcome>, now: DateTime<Utc>) -> Self {
        let successful_clones = results.iter().filter(|r| r.is_success()).count();
        Self {
            clone_date: now,
            total_repositories: results.len(),
            successful_clones,
            failed_clones: results.len() - successful_clones,
            results,
        }
    }
}

/// Last pipeline stage that finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DiscoveryComplete,
    CloningComplete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories_found: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_repositories: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_clones: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_clones: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_results_file: Option<PathBuf>,
}

/// Contents of `checkpoint.json`, used by `run --resume` to skip finished stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    pub stage: Stage,
    pub data: CheckpointData,
}

impl Checkpoint {
    #[must_use]
    pub fn discovery_complete(repositories_found: usize, repositories_file: &Path, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            stage: Stage::DiscoveryComplete,
            data: CheckpointData {
                repositories_found: Some(repositories_found),
                repositories_file: Some(repositories_file.to_path_buf()),
                ..CheckpointData::default()
            },
        }
    }

    #[must_use]
    pub fn cloning_complete(document: &CloneDocument, clone_results_file: &Path, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            stage: Stage::CloningComplete,
            data: CheckpointData {
                total_repositories: Some(document.total_repositories),
                successful_clones: Some(document.successful_clones),
                failed_clones: Some(document.failed_clones),
                clone_results_file: Some(clone_results_file.to_path_buf()),
                ..CheckpointData::default()
            },
        }
    }
}

/// File names of the pipeline outputs under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    output_dir: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn repositories_file(&self) -> PathBuf {
        self.output_dir.join("repositories.json")
    }

    #[must_use]
    pub fn clone_results_file(&self) -> PathBuf {
        self.output_dir.join("clone_results.json")
    }

    #[must_use]
    pub fn stats_file(&self) -> PathBuf {
        self.output_dir.join("stats.json")
    }

    #[must_use]
    pub fn checkpoint_file(&self) -> PathBuf {
        self.output_dir.join("checkpoint.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::ScoringConfig;
    use crate::harvest::clone::{CloneFailure, CloneFailureClass};
    use crate::harvest::record::test_support::{metadata, now};
    use core::time::Duration;
    use std::sync::Arc;

    fn record(full_name: &str) -> RepositoryRecord {
        RepositoryRecord::new(metadata(full_name), "Erlang", &ScoringConfig::default(), now())
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_discovery_document_survives_save_and_load() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(temp_dir.path().join("out"));

        let document = DiscoveryDocument::new(vec![record("erlang/otp"), record("ninenines/cowboy")], now());
        save(&document, layout.repositories_file()).unwrap();

        let loaded: DiscoveryDocument = load(layout.repositories_file(), "discovery results").unwrap();
        assert_eq!(loaded, document);
        assert_eq!(loaded.total_repositories, 2);
        assert_eq!(loaded.repositories[0].quality_score(), document.repositories[0].quality_score());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_checkpoint_survives_save_and_load() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let layout = OutputLayout::new(temp_dir.path());

        let results = vec![
            CloneOutcome::succeeded(Arc::new(record("a/b")), temp_dir.path().join("a/b"), Duration::from_secs(1), 1.0, false),
            CloneOutcome::failed(
                Arc::new(record("c/d")),
                CloneFailure {
                    class: CloneFailureClass::NotFound,
                    message: "Repository not found".to_string(),
                    attempts: 1,
                },
                Duration::ZERO,
            ),
        ];
        let document = CloneDocument::new(results, now());
        assert_eq!(document.successful_clones, 1);
        assert_eq!(document.failed_clones, 1);

        let checkpoint = Checkpoint::cloning_complete(&document, &layout.clone_results_file(), now());
        save(&checkpoint, layout.checkpoint_file()).unwrap();

        let loaded: Checkpoint = load(layout.checkpoint_file(), "checkpoint").unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.stage, Stage::CloningComplete);
        assert_eq!(loaded.data.successful_clones, Some(1));
        assert!(loaded.data.repositories_found.is_none());
    }

    #[test]
    fn test_checkpoint_wire_format() {
        let checkpoint = Checkpoint::discovery_complete(12, Path::new("out/repositories.json"), now());
        let value = serde_json::to_value(&checkpoint).unwrap();

        assert_eq!(value["stage"], "discovery_complete");
        assert_eq!(value["data"]["repositories_found"], 12);
        assert!(value["data"].get("clone_results_file").is_none());
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(Stage::DiscoveryComplete < Stage::CloningComplete);
        assert_eq!(Stage::CloningComplete.to_string(), "cloning_complete");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_load_reports_missing_and_corrupt_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("checkpoint.json");

        let err = load::<Checkpoint>(&path, "checkpoint").unwrap_err();
        assert!(err.to_string().contains("unable to open file"));
        assert!(load_if_present::<Checkpoint>(&path, "checkpoint").is_none());

        fs::write(&path, "{ not json").unwrap();
        let err = load::<Checkpoint>(&path, "checkpoint").unwrap_err();
        assert!(err.to_string().contains("unable to parse file"));
        assert!(load_if_present::<Checkpoint>(&path, "checkpoint").is_none());
    }
}
