use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::JoinKind;
use crate::error::{ConfigError, JoinError};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PARTITIONS: usize = 1;

/// Everything one join run needs. Built by the CLI, checked by [`validate`](Self::validate).
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct JoinConfig {
    pub first_path: PathBuf,
    pub second_path: PathBuf,
    pub key: String,
    #[serde(default)]
    pub kind: JoinKind,
    /// Number of hash partitions; 1 disables partitioning.
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// Base-side rows held in memory at once.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Root under which the per-run partition directory is created.
    #[serde(default = "std::env::temp_dir")]
    pub temp_dir: PathBuf,
    /// Worker threads joining partitions; 1 keeps everything on the caller's thread.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    pub output: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
}

fn default_partitions() -> usize {
    DEFAULT_PARTITIONS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_jobs() -> usize {
    1
}

impl JoinConfig {
    pub fn new(
        first_path: impl Into<PathBuf>,
        second_path: impl Into<PathBuf>,
        key: impl Into<String>,
        kind: JoinKind,
    ) -> Self {
        Self {
            first_path: first_path.into(),
            second_path: second_path.into(),
            key: key.into(),
            kind,
            partitions: DEFAULT_PARTITIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            temp_dir: std::env::temp_dir(),
            jobs: 1,
            output: None,
            summary_path: None,
        }
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Parameter and input-presence checks. Touches nothing on disk besides `stat`.
    pub fn validate(&self) -> Result<(), JoinError> {
        if self.key.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "key" }.into());
        }
        for (field, value) in [
            ("partitions", self.partitions),
            ("batch_size", self.batch_size),
            ("jobs", self.jobs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be > 0".into(),
                }
                .into());
            }
        }
        for path in [&self.first_path, &self.second_path] {
            if !path.is_file() {
                return Err(JoinError::NotFound { path: path.clone() });
            }
        }
        if self.temp_dir.exists() && !self.temp_dir.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "temp_dir",
                reason: format!("{} is not a directory", self.temp_dir.display()),
            }
            .into());
        }
        Ok(())
    }
}
