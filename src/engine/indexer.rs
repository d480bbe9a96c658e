//! Streams one side of a partition into bounded in-memory batches.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, JoinError, Result};
use crate::input::{self, FormatDescriptor};
use crate::models::{KeyColumn, Record};

/// Records sharing one key value, plus whether any probe row has hit them.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    pub records: Vec<Record>,
    pub matched: bool,
}

/// Key value -> bucket, for at most `batch_size` source rows.
///
/// Buckets keep the order in which their key was first seen.
#[derive(Debug, Default)]
pub struct Batch {
    slots: HashMap<String, usize>,
    buckets: Vec<(String, Bucket)>,
    rows: usize,
}

impl Batch {
    fn push(&mut self, key: &str, record: Record) {
        let slot = match self.slots.get(key) {
            Some(&slot) => slot,
            None => {
                self.buckets.push((key.to_string(), Bucket::default()));
                self.slots.insert(key.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        self.buckets[slot].1.records.push(record);
        self.rows += 1;
    }

    /// Source rows held by this batch.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Distinct key values.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Bucket> {
        self.slots.get(key).map(|&i| &self.buckets[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bucket> {
        match self.slots.get(key) {
            Some(&i) => Some(&mut self.buckets[i].1),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bucket)> {
        self.buckets.iter().map(|(k, b)| (k.as_str(), b))
    }

    /// Buckets no probe row matched, in first-seen key order.
    pub fn unmatched(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter().map(|(_, b)| b).filter(|b| !b.matched)
    }
}

/// Single-pass lazy sequence of [`Batch`]es over one file.
///
/// Every batch but the last holds exactly `batch_size` rows. A file without
/// data rows yields one empty batch. Re-reading requires a fresh stream.
pub struct BatchStream {
    reader: csv::Reader<File>,
    path: PathBuf,
    key: KeyColumn,
    batch_size: usize,
    record: Record,
    yielded: usize,
    done: bool,
}

impl BatchStream {
    /// Open `path` with an already known format and key column.
    pub fn open(
        path: &Path,
        format: &FormatDescriptor,
        key: KeyColumn,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be > 0".into(),
            }
            .into());
        }
        let mut reader = input::open_records(path, format)?;
        let mut record = Record::new();
        if !reader.read_record(&mut record)? {
            return Err(JoinError::format(path, "no header row"));
        }
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            key,
            batch_size,
            record,
            yielded: 0,
            done: false,
        })
    }

    fn fill(&mut self) -> Result<Batch> {
        let mut batch = Batch::default();
        while batch.rows < self.batch_size {
            if !self.reader.read_record(&mut self.record)? {
                self.done = true;
                break;
            }
            let key = self.key.value(&self.record, &self.path)?;
            batch.push(key, self.record.clone());
        }
        Ok(batch)
    }
}

impl Iterator for BatchStream {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(batch) => {
                // an exhausted file only produces an empty batch if nothing came before it
                if batch.rows == 0 && self.done && self.yielded > 0 {
                    return None;
                }
                self.yielded += 1;
                Some(Ok(batch))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Index `path` by `key_name`, sniffing its format first.
pub fn stream_batches(path: &Path, key_name: &str, batch_size: usize) -> Result<BatchStream> {
    if batch_size == 0 {
        return Err(ConfigError::InvalidValue {
            field: "batch_size",
            reason: "must be > 0".into(),
        }
        .into());
    }
    let (header, format) = input::load_header(path)?;
    let key = KeyColumn::resolve(&header, key_name, path)?;
    BatchStream::open(path, &format, key, batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn file(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("in.csv");
        fs::write(&p, body).unwrap();
        (dir, p)
    }

    #[test]
    fn batches_are_bounded() {
        let mut body = String::from("id,v\n");
        for i in 0..7 {
            body.push_str(&format!("{},{}\n", i % 3, i));
        }
        let (_d, p) = file(&body);
        let rows: Vec<usize> = stream_batches(&p, "id", 3)
            .unwrap()
            .map(|b| b.unwrap().rows())
            .collect();
        assert_eq!(rows, vec![3, 3, 1]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_batch() {
        let (_d, p) = file("id,v\n1,a\n2,b\n3,c\n4,d\n");
        let rows: Vec<usize> = stream_batches(&p, "id", 2)
            .unwrap()
            .map(|b| b.unwrap().rows())
            .collect();
        assert_eq!(rows, vec![2, 2]);
    }

    #[test]
    fn header_only_file_yields_one_empty_batch() {
        let (_d, p) = file("id,v\n");
        let batches: Vec<Batch> = stream_batches(&p, "id", 10)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].is_empty());
    }

    #[test]
    fn groups_rows_by_key_in_first_seen_order() {
        let (_d, p) = file("v,id\na,2\nb,1\nc,2\n");
        let batch = stream_batches(&p, "id", 100)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 2);
        let keys: Vec<&str> = batch.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["2", "1"]);
        let two = batch.get("2").unwrap();
        assert_eq!(two.records.len(), 2);
        assert_eq!(&two.records[1][0], "c");
        assert!(!two.matched);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let (_d, p) = file("id\n1\n");
        assert!(matches!(
            stream_batches(&p, "id", 0),
            Err(JoinError::Validation(_))
        ));
    }

    #[test]
    fn loader_failures_propagate() {
        let (_d, p) = file("");
        assert!(matches!(
            stream_batches(&p, "id", 5),
            Err(JoinError::Format { .. })
        ));
        let (_d2, p2) = file("a,b\n1,2\n");
        assert!(matches!(
            stream_batches(&p2, "id", 5),
            Err(JoinError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn restart_reopens_from_start() {
        let (_d, p) = file("id\n1\n2\n3\n");
        let first: usize = stream_batches(&p, "id", 2)
            .unwrap()
            .map(|b| b.unwrap().rows())
            .sum();
        let second: usize = stream_batches(&p, "id", 2)
            .unwrap()
            .map(|b| b.unwrap().rows())
            .sum();
        assert_eq!(first, 3);
        assert_eq!(second, 3);
    }
}
