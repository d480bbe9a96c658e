//! Orchestrator: drives one join run end to end.
//!
//! Order of work:
//! 1. validate parameters and inputs, resolve the key in both schemas
//! 2. partition both inputs (or reuse them as-is for a single partition)
//! 3. join partition pairs one after another (or `jobs` at a time)
//! 4. release partition storage, on success and on every failure path

pub mod summary;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use rayon::prelude::*;

use crate::config::JoinConfig;
use crate::engine::{JoinEngine, PartitionStats, SideSchema};
use crate::error::{ConfigError, JoinError, Result};
use crate::export::csv_export::{JoinedCsvWriter, export_summary_csv};
use crate::input;
use crate::models::{Header, KeyColumn, Record};
use crate::util::partition::{HashPartitioner, PartitionPair};

use summary::{RunSummary, SummaryBuilder};

/// Schemas of both inputs with the key resolved, plus the output header.
#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    pub first: SideSchema,
    pub second: SideSchema,
    pub merged_header: Header,
}

/// Load both headers and resolve the key column in each. No side effects.
pub fn resolve_inputs(cfg: &JoinConfig) -> Result<ResolvedInputs> {
    let (first_header, first_format) = input::load_header(&cfg.first_path)?;
    let (second_header, second_format) = input::load_header(&cfg.second_path)?;
    let first_key = KeyColumn::resolve(&first_header, &cfg.key, &cfg.first_path)?;
    let second_key = KeyColumn::resolve(&second_header, &cfg.key, &cfg.second_path)?;
    info!(
        "join key '{}' is column #{} of {} and #{} of {}",
        cfg.key,
        first_key.index + 1,
        cfg.first_path.display(),
        second_key.index + 1,
        cfg.second_path.display()
    );
    let merged_header = Header::merged(&first_header, &second_header, second_key.index);
    Ok(ResolvedInputs {
        first: SideSchema {
            key: first_key,
            format: first_format,
            width: first_header.len(),
        },
        second: SideSchema {
            key: second_key,
            format: second_format,
            width: second_header.len(),
        },
        merged_header,
    })
}

/// Run the join described by `cfg`, streaming the merged header and every
/// result row to `out` in the first input's format.
pub fn run<W: Write>(cfg: &JoinConfig, out: W) -> Result<RunSummary> {
    cfg.validate()?;
    let resolved = resolve_inputs(cfg)?;
    run_resolved(cfg, &resolved, out)
}

fn run_resolved<W: Write>(
    cfg: &JoinConfig,
    resolved: &ResolvedInputs,
    out: W,
) -> Result<RunSummary> {
    let mut builder = SummaryBuilder::new(cfg);
    let mut sink = JoinedCsvWriter::from_writer(out, &resolved.first.format);
    let engine = JoinEngine::new(
        cfg.kind,
        cfg.batch_size,
        resolved.first.clone(),
        resolved.second.clone(),
    );

    let mut partitioner =
        HashPartitioner::new(&cfg.first_path, &cfg.second_path, &cfg.temp_dir);
    let outcome = join_all(
        cfg,
        &engine,
        &mut partitioner,
        &resolved.merged_header,
        &mut sink,
        &mut builder,
    );
    let released = partitioner.close();
    outcome?;
    released?;
    let written = sink.rows();
    sink.finish()?;

    let summary = builder.build();
    debug_assert_eq!(written, summary.rows_emitted);
    info!(
        "{} join finished: {} rows ({} matched, {} padded) in {:.3}s, mem {} -> {} MB",
        summary.join_kind,
        summary.rows_emitted,
        summary.matched_rows,
        summary.unmatched_rows,
        summary.duration_secs,
        summary.mem_used_start_mb,
        summary.mem_used_end_mb
    );
    if let Some(path) = &cfg.summary_path {
        export_summary_csv(path, &summary)?;
        debug!("summary written to {}", path.display());
    }
    Ok(summary)
}

/// [`run`] writing to `cfg.output`, or stdout when unset. The output file is
/// only created once both inputs and the key have been checked.
pub fn run_to_configured_output(cfg: &JoinConfig) -> Result<RunSummary> {
    cfg.validate()?;
    let resolved = resolve_inputs(cfg)?;
    match &cfg.output {
        Some(path) => {
            check_output_path(cfg, path)?;
            let file = File::create(path)?;
            run_resolved(cfg, &resolved, BufWriter::with_capacity(512 * 1024, file))
        }
        None => {
            let stdout = io::stdout();
            run_resolved(cfg, &resolved, BufWriter::new(stdout.lock()))
        }
    }
}

/// Reject an output path that names one of the inputs.
fn check_output_path(cfg: &JoinConfig, output: &Path) -> Result<()> {
    let Ok(target) = fs::canonicalize(output) else {
        // not there yet, so it cannot be an input
        return Ok(());
    };
    for input in [&cfg.first_path, &cfg.second_path] {
        if fs::canonicalize(input)? == target {
            return Err(ConfigError::InvalidValue {
                field: "output",
                reason: format!("{} is also an input file", output.display()),
            }
            .into());
        }
    }
    Ok(())
}

fn join_all<W: Write>(
    cfg: &JoinConfig,
    engine: &JoinEngine,
    partitioner: &mut HashPartitioner,
    header: &Header,
    sink: &mut JoinedCsvWriter<W>,
    builder: &mut SummaryBuilder,
) -> Result<()> {
    partitioner.initialize(&cfg.key, cfg.partitions)?;
    builder.set_routed(partitioner.stats());
    let pairs: Vec<PartitionPair> = match partitioner.open() {
        Some(pairs) => pairs.to_vec(),
        None => return Ok(()),
    };

    sink.write_header(header)?;
    if cfg.jobs > 1 && pairs.len() > 1 {
        join_parallel(engine, &pairs, cfg.jobs, sink, builder)?;
    } else {
        for pair in &pairs {
            let stats = engine.join_partition(pair, |row| sink.write(row))?;
            builder.add_partition(&stats);
        }
    }
    sink.flush_partial()
}

/// Join up to `jobs` partitions at a time on a rayon pool. Each partition
/// buffers its own rows; buffers are written in partition order.
fn join_parallel<W: Write>(
    engine: &JoinEngine,
    pairs: &[PartitionPair],
    jobs: usize,
    sink: &mut JoinedCsvWriter<W>,
    builder: &mut SummaryBuilder,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| JoinError::Io(io::Error::other(e.to_string())))?;
    info!("joining {} partitions on {} workers", pairs.len(), jobs);

    for wave in pairs.chunks(jobs) {
        let results: Vec<Result<(Vec<Record>, PartitionStats)>> = pool.install(|| {
            wave.par_iter()
                .map(|pair| -> Result<(Vec<Record>, PartitionStats)> {
                    let mut rows = Vec::new();
                    let stats = engine.join_partition(pair, |row| {
                        rows.push(row.clone());
                        Ok(())
                    })?;
                    Ok((rows, stats))
                })
                .collect()
        });
        for result in results {
            let (rows, stats) = result?;
            for row in &rows {
                sink.write(row)?;
            }
            builder.add_partition(&stats);
        }
    }
    Ok(())
}
