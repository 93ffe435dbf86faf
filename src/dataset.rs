//! Benchmark instance loading.
//!
//! A dataset is either a single YAML file containing a list of instances,
//! or a directory tree scanned recursively for `instance.yaml` files
//! (one benchmark task per file). Instances are returned in deterministic
//! order and instance ids must be unique within one load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// A single benchmark task instance.
///
/// Immutable after load; one attempt set is produced per instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Unique identifier, e.g. `my-repo.task-3`.
    pub instance_id: String,
    /// Repository the task targets, e.g. `owner/repo`.
    pub repo: String,
    /// Task description shown to the agent.
    pub prompt: String,
    /// Git ref of the base state the agent starts from.
    #[serde(default)]
    pub base_commit: String,
}

/// Load all instances from a dataset path.
///
/// Accepts a YAML file holding a list of [`TaskInstance`] entries, or a
/// directory containing `instance.yaml` files in any nesting. Paths are
/// sorted before parsing so the returned order is deterministic.
///
/// # Errors
///
/// Returns [`ConfigError`] if the path does not exist, no instances are
/// found, an instance file fails to parse, or two instances share an id.
pub fn load_instances(dataset: &Path) -> Result<Vec<TaskInstance>, ConfigError> {
    if !dataset.exists() {
        return Err(ConfigError::DatasetNotFound(dataset.display().to_string()));
    }

    let instances = if dataset.is_file() {
        let content = std::fs::read_to_string(dataset)?;
        serde_yaml::from_str::<Vec<TaskInstance>>(&content)?
    } else {
        let mut paths = Vec::new();
        collect_instance_files(dataset, &mut paths);
        paths.sort();

        let mut instances = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = std::fs::read_to_string(path)?;
            match serde_yaml::from_str::<TaskInstance>(&content) {
                Ok(instance) => instances.push(instance),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparseable instance file");
                }
            }
        }
        instances
    };

    if instances.is_empty() {
        return Err(ConfigError::EmptyDataset(dataset.display().to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for instance in &instances {
        if !seen.insert(instance.instance_id.as_str()) {
            return Err(ConfigError::DuplicateInstance(instance.instance_id.clone()));
        }
    }

    info!(
        count = instances.len(),
        dataset = %dataset.display(),
        "Loaded dataset instances"
    );
    Ok(instances)
}

fn collect_instance_files(dir: &Path, paths: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let p = entry.path();
            if p.is_dir() {
                collect_instance_files(&p, paths);
            } else if p
                .file_name()
                .map(|f| f == "instance.yaml")
                .unwrap_or(false)
            {
                paths.push(p);
            }
        }
    }
}
