use rollback_logger::Severity;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Errors from loading a manager configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// State manager configuration.
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Minimum severity recorded by the state journal.
    pub log_level: Severity,
    /// Maximum number of retained snapshots. `None` keeps all of them.
    pub snapshot_retention: Option<NonZeroUsize>,
    /// Run command bodies against a staged copy and commit only on success.
    pub stage_commands: bool,
    /// Journal a structural diff for every state transition.
    pub diff_commands: bool,
    /// Recursion bound for journaled diffs.
    pub max_diff_depth: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_level: Severity::Info,
            snapshot_retention: None,
            stage_commands: true,
            diff_commands: true,
            max_diff_depth: 64,
        }
    }
}

impl ManagerConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn with_log_level(mut self, level: Severity) -> Self {
        self.log_level = level;
        self
    }

    /// Keep at most `limit` snapshots; zero means unbounded.
    pub fn with_retention(mut self, limit: usize) -> Self {
        self.snapshot_retention = NonZeroUsize::new(limit);
        self
    }

    pub fn with_staging(mut self, stage_commands: bool) -> Self {
        self.stage_commands = stage_commands;
        self
    }

    pub fn with_diffs(mut self, diff_commands: bool) -> Self {
        self.diff_commands = diff_commands;
        self
    }
}
