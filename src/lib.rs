pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod util;

pub use config::JoinConfig;
pub use engine::{JoinEngine, JoinKind};
pub use error::{ConfigError, JoinError};
pub use orchestrator::summary::RunSummary;
pub use orchestrator::{run, run_to_configured_output};
