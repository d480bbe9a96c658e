use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_PARTITIONS, JoinConfig};
use crate::engine::JoinKind;
use crate::error::ConfigError;

/// Operations the binary knows. Only `join` exists today.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Operation {
    Join,
}

impl FromStr for Operation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "join" => Ok(Operation::Join),
            other => Err(ConfigError::InvalidValue {
                field: "operation",
                reason: format!("unsupported operation '{other}' (supported: join)"),
            }),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "csv-join",
    version,
    about = "Equality join (inner/left/right) of two delimited files that may not fit in memory",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Operation to perform (join)
    #[arg(value_name = "OPERATION")]
    pub operation: String,
    /// First (left-hand) input file
    #[arg(value_name = "FIRST")]
    pub first: PathBuf,
    /// Second (right-hand) input file
    #[arg(value_name = "SECOND")]
    pub second: PathBuf,
    /// Join column; must exist in both files
    #[arg(value_name = "COLUMN")]
    pub column: String,
    /// Join type: inner, left or right
    #[arg(value_name = "JOIN_TYPE", default_value = "inner")]
    pub join_type: String,
    /// Number of hash partitions written to temp storage (1 = no partitioning)
    #[arg(
        long = "hash",
        visible_alias = "partitions",
        value_name = "N",
        env = "CSV_JOIN_PARTITIONS",
        default_value_t = DEFAULT_PARTITIONS as i64,
        allow_negative_numbers = true
    )]
    pub hash: i64,
    /// Rows of one side indexed in memory per batch
    #[arg(
        long = "batch",
        value_name = "N",
        env = "CSV_JOIN_BATCH",
        default_value_t = DEFAULT_BATCH_SIZE as i64,
        allow_negative_numbers = true
    )]
    pub batch: i64,
    /// Directory under which the per-run partition directory is created
    #[arg(long = "temp-dir", value_name = "DIR", env = "CSV_JOIN_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
    /// Partitions joined concurrently (output order stays per-partition)
    #[arg(
        long = "jobs",
        value_name = "N",
        env = "CSV_JOIN_JOBS",
        default_value_t = 1,
        allow_negative_numbers = true
    )]
    pub jobs: i64,
    /// Write joined rows here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Write a one-row CSV run summary here
    #[arg(long = "summary", value_name = "PATH")]
    pub summary: Option<PathBuf>,
}

fn positive(field: &'static str, value: i64) -> Result<usize, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is not a positive integer"),
        });
    }
    usize::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("{value} is too large"),
    })
}

impl Cli {
    /// Check every option and build the run configuration. Input files are
    /// checked later by [`JoinConfig::validate`].
    pub fn to_join_config(&self) -> Result<JoinConfig, ConfigError> {
        let _operation: Operation = self.operation.parse()?;
        let kind: JoinKind = self.join_type.parse()?;
        if self.column.is_empty() {
            return Err(ConfigError::MissingField { field: "column" });
        }

        let mut cfg = JoinConfig::new(&self.first, &self.second, &self.column, kind)
            .with_partitions(positive("hash", self.hash)?)
            .with_batch_size(positive("batch", self.batch)?)
            .with_jobs(positive("jobs", self.jobs)?);
        if let Some(dir) = &self.temp_dir {
            cfg = cfg.with_temp_dir(dir);
        }
        cfg.output = self.output.clone();
        cfg.summary_path = self.summary.clone();
        Ok(cfg)
    }
}

pub fn parse_cli_to_join_config() -> Result<JoinConfig, ConfigError> {
    let cli = Cli::parse();
    cli.to_join_config()
}
