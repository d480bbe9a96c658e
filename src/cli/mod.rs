//! Command-line surface of `csv-join`.
//!
//! Mirrors the positional layout `join <FIRST> <SECOND> <COLUMN> [TYPE]`
//! with `--hash`/`--batch` tuning options. Parsing is done by clap; range
//! checks are left to [`Cli::to_join_config`] so that bad numbers surface as
//! validation errors instead of usage errors.

mod clap_parser;

pub use clap_parser::{Cli, Operation, parse_cli_to_join_config};
