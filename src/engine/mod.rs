//! Partition-at-a-time hash join.
//!
//! One side of a partition (the base) is loaded batch by batch into memory;
//! the other side (the probe) is streamed once per batch. Inner, left and
//! right joins share [`JoinEngine::join_partition`] and differ only in which
//! input is the base and what happens to base buckets no probe row matched.

pub mod indexer;

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::input::{self, FormatDescriptor};
use crate::models::{KeyColumn, Record};
use crate::util::partition::PartitionPair;

pub use indexer::{Batch, BatchStream, Bucket, stream_batches};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

/// Which input is held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSide {
    First,
    Second,
}

impl JoinKind {
    pub const ALL: [JoinKind; 3] = [JoinKind::Inner, JoinKind::Left, JoinKind::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
        }
    }

    /// Right join is a left join with the inputs' roles swapped.
    pub fn base_side(&self) -> BaseSide {
        match self {
            JoinKind::Inner | JoinKind::Left => BaseSide::First,
            JoinKind::Right => BaseSide::Second,
        }
    }

    /// Whether unmatched base rows are emitted with a placeholder.
    pub fn keeps_unmatched(&self) -> bool {
        !matches!(self, JoinKind::Inner)
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinKind::Inner),
            "left" => Ok(JoinKind::Left),
            "right" => Ok(JoinKind::Right),
            other => Err(ConfigError::InvalidValue {
                field: "join_type",
                reason: format!("unsupported join type '{other}' (inner, left, right)"),
            }),
        }
    }
}

/// Schema facts of one input needed to read its shards and shape output.
#[derive(Debug, Clone)]
pub struct SideSchema {
    pub key: KeyColumn,
    pub format: FormatDescriptor,
    pub width: usize,
}

/// Counters for one partition (or a sum of them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub batches: u64,
    pub probe_rows_scanned: u64,
    pub rows_emitted: u64,
    pub matched_rows: u64,
    pub unmatched_rows: u64,
}

impl PartitionStats {
    pub fn absorb(&mut self, other: &PartitionStats) {
        self.batches += other.batches;
        self.probe_rows_scanned += other.probe_rows_scanned;
        self.rows_emitted += other.rows_emitted;
        self.matched_rows += other.matched_rows;
        self.unmatched_rows += other.unmatched_rows;
    }
}

pub struct JoinEngine {
    kind: JoinKind,
    batch_size: usize,
    first: SideSchema,
    second: SideSchema,
}

impl JoinEngine {
    pub fn new(kind: JoinKind, batch_size: usize, first: SideSchema, second: SideSchema) -> Self {
        Self {
            kind,
            batch_size,
            first,
            second,
        }
    }

    /// Output width: all first-input columns plus second-input columns minus the key.
    pub fn output_width(&self) -> usize {
        self.first.width + self.second.width - 1
    }

    /// Join one partition pair, handing every output row to `emit` in
    /// canonical column order.
    pub fn join_partition<F>(&self, pair: &PartitionPair, mut emit: F) -> Result<PartitionStats>
    where
        F: FnMut(&Record) -> Result<()>,
    {
        let (base_path, base, probe_path, probe) = match self.kind.base_side() {
            BaseSide::First => (&pair.first, &self.first, &pair.second, &self.second),
            BaseSide::Second => (&pair.second, &self.second, &pair.first, &self.first),
        };

        let mut stats = PartitionStats::default();
        let mut probe_rdr = input::open_records(probe_path, &probe.format)?;
        let mut probe_row = Record::new();
        let mut out = Record::with_capacity(256, self.output_width());

        let batches = BatchStream::open(base_path, &base.format, base.key.clone(), self.batch_size)?;
        for batch in batches {
            let mut batch = batch?;
            stats.batches += 1;
            if batch.is_empty() && !self.kind.keeps_unmatched() {
                continue;
            }

            input::rewind_past_header(&mut probe_rdr, &mut probe_row)?;
            while probe_rdr.read_record(&mut probe_row)? {
                stats.probe_rows_scanned += 1;
                let key = probe.key.value(&probe_row, probe_path)?;
                let Some(bucket) = batch.get_mut(key) else {
                    continue;
                };
                for base_row in &bucket.records {
                    self.compose(&mut out, Some(base_row), Some(&probe_row));
                    emit(&out)?;
                    stats.matched_rows += 1;
                }
                bucket.matched = true;
            }

            if self.kind.keeps_unmatched() {
                for bucket in batch.unmatched() {
                    for base_row in &bucket.records {
                        self.compose(&mut out, Some(base_row), None);
                        emit(&out)?;
                        stats.unmatched_rows += 1;
                    }
                }
            }
        }

        stats.rows_emitted = stats.matched_rows + stats.unmatched_rows;
        debug!(
            "partition {}: {} batches, {} matched, {} padded",
            pair.index, stats.batches, stats.matched_rows, stats.unmatched_rows
        );
        Ok(stats)
    }

    /// Lay `base`/`probe` out as (first-input fields) ++ (second-input fields
    /// minus key). A missing probe row becomes an all-empty placeholder.
    fn compose(&self, out: &mut Record, base: Option<&Record>, probe: Option<&Record>) {
        let (first_row, second_row) = match self.kind.base_side() {
            BaseSide::First => (base, probe),
            BaseSide::Second => (probe, base),
        };
        out.clear();
        match first_row {
            Some(row) => row.iter().for_each(|f| out.push_field(f)),
            None => (0..self.first.width).for_each(|_| out.push_field("")),
        }
        let key = self.second.key.index;
        match second_row {
            Some(row) => row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != key)
                .for_each(|(_, f)| out.push_field(f)),
            None => (1..self.second.width).for_each(|_| out.push_field("")),
        }
    }
}
