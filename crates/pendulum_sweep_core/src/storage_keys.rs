use std::path::{Path, PathBuf};

use crate::contract::ValidationError;

pub const DEFAULT_RESULTS_FILE_NAME: &str = "results.csv";

/// Lifecycle markers written by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    Started,
    Completed,
    Aborted,
}

impl LifecycleStatus {
    pub const ALL: [LifecycleStatus; 3] = [Self::Started, Self::Completed, Self::Aborted];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status names become file names, so they must be a single plain path component.
pub fn validate_status_name(name: &str) -> Result<&str, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("status name cannot be empty"));
    }

    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ValidationError::new(format!(
            "status name '{name}' must not contain path separators"
        )));
    }

    Ok(name)
}

pub fn status_record_path(status_dir: &Path, name: &str) -> Result<PathBuf, ValidationError> {
    Ok(status_dir.join(validate_status_name(name)?))
}

pub fn results_table_path(results_dir: &Path, file_name: &str) -> PathBuf {
    results_dir.join(file_name)
}

pub fn queue_metric_path(prefix: &str, queue: &str, metric: &str) -> String {
    let trimmed = prefix.trim_matches('.');
    if trimmed.is_empty() {
        format!("queue.{queue}.{metric}")
    } else {
        format!("{trimmed}.queue.{queue}.{metric}")
    }
}
