//! Logger setup for the `csv-join` binary.
//!
//! Library code only uses the `log` facade. The binary picks a backend:
//! `env_logger` by default, or a `tracing` subscriber (with `log` bridged in)
//! when `CSV_JOIN_TRACING` is set to `1`/`true`.

use env_logger::Env;

pub const TRACING_ENV: &str = "CSV_JOIN_TRACING";

fn tracing_requested() -> bool {
    std::env::var(TRACING_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn init_tracing_from_env() {
    // bridge log:: macros into tracing
    let _ = tracing_log::LogTracer::init();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Install exactly one logging backend. Output always goes to stderr so the
/// joined rows on stdout stay clean.
pub fn init() {
    if tracing_requested() {
        init_tracing_from_env();
    } else {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .target(env_logger::Target::Stderr)
            .try_init();
    }
}
