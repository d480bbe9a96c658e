use anyhow::{Context, Result};
use log::{error, info};

use csv_hash_join::cli::parse_cli_to_join_config;
use csv_hash_join::logging;
use csv_hash_join::orchestrator;
use csv_hash_join::util::envfile::load_dotenv_if_present;

fn main() {
    // .env first so RUST_LOG and CSV_JOIN_* from it are honoured
    let dotenv = load_dotenv_if_present();
    logging::init();
    if let Err(e) = &dotenv {
        log::warn!("{:#}", e);
    }

    let cfg = match parse_cli_to_join_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&cfg) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cfg: &csv_hash_join::JoinConfig) -> Result<()> {
    info!(
        "{} join of {} and {} on '{}' ({} partitions, batch {}, {} jobs)",
        cfg.kind,
        cfg.first_path.display(),
        cfg.second_path.display(),
        cfg.key,
        cfg.partitions,
        cfg.batch_size,
        cfg.jobs
    );
    let summary = orchestrator::run_to_configured_output(cfg).with_context(|| {
        format!(
            "joining {} with {}",
            cfg.first_path.display(),
            cfg.second_path.display()
        )
    })?;
    if let Some(path) = &cfg.output {
        info!("wrote {} rows to {}", summary.rows_emitted, path.display());
    }
    Ok(())
}
