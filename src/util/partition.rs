use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, JoinError, Result};
use crate::input::{self, FormatDescriptor};
use crate::models::{KeyColumn, Record};

/// FNV-1a over raw bytes. Stable across processes and platforms.
#[inline]
pub fn fnv1a64_bytes(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325; // FNV offset basis
    let prime: u64 = 0x100000001b3; // FNV prime
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(prime);
    }
    hash
}

/// Maps a join-key value to a partition index. Both inputs of a run must
/// share one strategy so equal keys land in the same index.
pub trait PartitionStrategy {
    fn partition_count(&self) -> usize;
    fn partition_of(&self, key: &str) -> usize;
}

#[derive(Debug, Clone, Copy)]
pub struct HashModulo {
    count: usize,
}

impl HashModulo {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "partitions",
                reason: "must be > 0".into(),
            }
            .into());
        }
        Ok(Self { count })
    }
}

impl PartitionStrategy for HashModulo {
    fn partition_count(&self) -> usize {
        self.count
    }

    fn partition_of(&self, key: &str) -> usize {
        (fnv1a64_bytes(key.as_bytes()) % self.count as u64) as usize
    }
}

/// Two files sharing a partition index, one per input side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPair {
    pub index: usize,
    pub first: PathBuf,
    pub second: PathBuf,
}

/// Rows routed by one `initialize` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub first_rows: u64,
    pub second_rows: u64,
}

/// Splits both inputs into `N` shard pairs under a run-unique directory.
///
/// Layout: `<temp_root>/csvjoin-<uuid>/part<i>/{first,second}.csv`. Every
/// shard starts with its source header and is written in its source's
/// format. Temp storage is removed by [`close`](Self::close), which also
/// runs on drop.
#[derive(Debug)]
pub struct HashPartitioner {
    first: PathBuf,
    second: PathBuf,
    temp_root: PathBuf,
    run_dir: Option<PathBuf>,
    pairs: Vec<PartitionPair>,
    stats: Option<PartitionStats>,
    initialized: bool,
}

impl HashPartitioner {
    pub fn new(
        first: impl Into<PathBuf>,
        second: impl Into<PathBuf>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            temp_root: temp_root.into(),
            run_dir: None,
            pairs: Vec::new(),
            stats: None,
            initialized: false,
        }
    }

    /// Build `partition_count` shard pairs keyed on `key_name`.
    ///
    /// A count of one is a no-op: the original paths become the only pair
    /// and nothing is written.
    pub fn initialize(&mut self, key_name: &str, partition_count: usize) -> Result<()> {
        let strategy = HashModulo::new(partition_count)?;
        if self.run_dir.is_some() {
            self.close()?;
        }
        self.pairs.clear();
        self.stats = None;

        if partition_count == 1 {
            self.pairs.push(PartitionPair {
                index: 0,
                first: self.first.clone(),
                second: self.second.clone(),
            });
            self.initialized = true;
            debug!("partition count 1: joining original files directly");
            return Ok(());
        }

        let (first_header, first_fmt) = input::load_header(&self.first)?;
        let (second_header, second_fmt) = input::load_header(&self.second)?;
        let first_key = KeyColumn::resolve(&first_header, key_name, &self.first)?;
        let second_key = KeyColumn::resolve(&second_header, key_name, &self.second)?;

        fs::create_dir_all(&self.temp_root)?;
        let run_dir = self
            .temp_root
            .join(format!("csvjoin-{}", Uuid::new_v4().simple()));
        fs::create_dir(&run_dir)?;
        self.run_dir = Some(run_dir.clone());
        info!(
            "partitioning into {} shards under {}",
            partition_count,
            run_dir.display()
        );

        let mut pairs = Vec::with_capacity(partition_count);
        let mut first_writers = Vec::with_capacity(partition_count);
        let mut second_writers = Vec::with_capacity(partition_count);
        for index in 0..partition_count {
            let dir = run_dir.join(format!("part{index}"));
            fs::create_dir(&dir)?;
            let pair = PartitionPair {
                index,
                first: dir.join("first.csv"),
                second: dir.join("second.csv"),
            };
            first_writers.push(create_shard(&pair.first, &first_fmt, &first_header.to_record())?);
            second_writers.push(create_shard(
                &pair.second,
                &second_fmt,
                &second_header.to_record(),
            )?);
            pairs.push(pair);
        }

        let first_rows = route(&self.first, &first_fmt, &first_key, &strategy, &mut first_writers)?;
        let second_rows = route(
            &self.second,
            &second_fmt,
            &second_key,
            &strategy,
            &mut second_writers,
        )?;
        for w in first_writers.iter_mut().chain(second_writers.iter_mut()) {
            w.flush()?;
        }
        drop(first_writers);
        drop(second_writers);

        info!(
            "routed {} + {} rows into {} partitions",
            first_rows, second_rows, partition_count
        );
        self.pairs = pairs;
        self.stats = Some(PartitionStats {
            first_rows,
            second_rows,
        });
        self.initialized = true;
        Ok(())
    }

    /// Partition pairs in index order; `None` (and a warning) before `initialize`.
    pub fn open(&self) -> Option<&[PartitionPair]> {
        if !self.initialized {
            warn!("partitioner not initialized");
            return None;
        }
        Some(&self.pairs)
    }

    /// Routing counts of the last `initialize`, absent for the no-op case.
    pub fn stats(&self) -> Option<PartitionStats> {
        self.stats
    }

    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    /// Delete shard files, then partition directories, then the run directory.
    /// Safe to call repeatedly and after a failed `initialize`.
    pub fn close(&mut self) -> Result<()> {
        self.pairs.clear();
        self.initialized = false;
        let Some(run_dir) = self.run_dir.take() else {
            return Ok(());
        };
        if let Err(e) = remove_ordered(&run_dir) {
            warn!(
                "ordered cleanup of {} failed ({}); removing recursively",
                run_dir.display(),
                e
            );
            match fs::remove_dir_all(&run_dir) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(JoinError::Io(e)),
                _ => {}
            }
        }
        debug!("removed {}", run_dir.display());
        Ok(())
    }
}

impl Drop for HashPartitioner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to release partition storage: {e}");
        }
    }
}

fn create_shard(
    path: &Path,
    format: &FormatDescriptor,
    header: &Record,
) -> Result<csv::Writer<File>> {
    let mut w = format.writer_builder().from_path(path)?;
    w.write_record(header)?;
    Ok(w)
}

fn route(
    path: &Path,
    format: &FormatDescriptor,
    key: &KeyColumn,
    strategy: &impl PartitionStrategy,
    writers: &mut [csv::Writer<File>],
) -> Result<u64> {
    let mut rdr = input::open_records(path, format)?;
    let mut rec = Record::new();
    rdr.read_record(&mut rec)?;
    let mut rows = 0u64;
    while rdr.read_record(&mut rec)? {
        let idx = strategy.partition_of(key.value(&rec, path)?);
        writers[idx].write_record(&rec)?;
        rows += 1;
    }
    debug!(
        "{}: {} rows routed into {} partitions",
        path.display(),
        rows,
        strategy.partition_count()
    );
    Ok(rows)
}

fn ignore_missing(r: io::Result<()>) -> io::Result<()> {
    match r {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_ordered(run_dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(run_dir) {
        Ok(it) => it,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let part_dir = entry?.path();
        for file in fs::read_dir(&part_dir)? {
            ignore_missing(fs::remove_file(file?.path()))?;
        }
        ignore_missing(fs::remove_dir(&part_dir))?;
    }
    ignore_missing(fs::remove_dir(run_dir))
}
