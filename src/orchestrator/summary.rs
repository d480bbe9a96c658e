//! Run summary reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::JoinConfig;
use crate::engine::PartitionStats;
use crate::metrics::MemorySnapshot;
use crate::util::partition;

/// Flat record of one completed run, serialisable as a single CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub join_kind: String,
    pub first_path: String,
    pub second_path: String,
    pub key: String,
    pub partitions: usize,
    pub batch_size: usize,
    pub jobs: usize,
    /// Data rows routed into shards; empty when partitioning was skipped.
    pub first_rows_partitioned: Option<u64>,
    pub second_rows_partitioned: Option<u64>,
    pub batches: u64,
    pub probe_rows_scanned: u64,
    pub rows_emitted: u64,
    pub matched_rows: u64,
    pub unmatched_rows: u64,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: DateTime<Utc>,
    pub duration_secs: f64,
    pub mem_used_start_mb: u64,
    pub mem_used_end_mb: u64,
}

/// Accumulates a [`RunSummary`] while a run progresses.
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    join_kind: String,
    first_path: String,
    second_path: String,
    key: String,
    partitions: usize,
    batch_size: usize,
    jobs: usize,
    routed: Option<partition::PartitionStats>,
    totals: PartitionStats,
    started_utc: DateTime<Utc>,
    mem_start: MemorySnapshot,
}

impl SummaryBuilder {
    pub fn new(cfg: &JoinConfig) -> Self {
        Self {
            join_kind: cfg.kind.to_string(),
            first_path: cfg.first_path.display().to_string(),
            second_path: cfg.second_path.display().to_string(),
            key: cfg.key.clone(),
            partitions: cfg.partitions,
            batch_size: cfg.batch_size,
            jobs: cfg.jobs,
            routed: None,
            totals: PartitionStats::default(),
            started_utc: Utc::now(),
            mem_start: MemorySnapshot::capture(),
        }
    }

    /// Record how many rows the partitioner routed; `None` when it was a no-op.
    pub fn set_routed(&mut self, routed: Option<partition::PartitionStats>) {
        self.routed = routed;
    }

    pub fn add_partition(&mut self, stats: &PartitionStats) {
        self.totals.absorb(stats);
    }

    /// Stamp the end time and memory, and produce the summary.
    pub fn build(self) -> RunSummary {
        let ended_utc = Utc::now();
        let duration_secs = (ended_utc - self.started_utc).num_milliseconds() as f64 / 1000.0;
        RunSummary {
            join_kind: self.join_kind,
            first_path: self.first_path,
            second_path: self.second_path,
            key: self.key,
            partitions: self.partitions,
            batch_size: self.batch_size,
            jobs: self.jobs,
            first_rows_partitioned: self.routed.map(|r| r.first_rows),
            second_rows_partitioned: self.routed.map(|r| r.second_rows),
            batches: self.totals.batches,
            probe_rows_scanned: self.totals.probe_rows_scanned,
            rows_emitted: self.totals.rows_emitted,
            matched_rows: self.totals.matched_rows,
            unmatched_rows: self.totals.unmatched_rows,
            started_utc: self.started_utc,
            ended_utc,
            duration_secs,
            mem_used_start_mb: self.mem_start.used_mb,
            mem_used_end_mb: MemorySnapshot::capture().used_mb,
        }
    }
}
