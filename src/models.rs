use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{JoinError, Result};

/// One data row, fields positionally aligned to its file's [`Header`].
pub type Record = csv::StringRecord;

/// Ordered field names of one delimited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of the first field called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Names that occur more than once, in first-seen order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for n in &self.names {
            if !seen.insert(n.as_str()) && !dups.contains(&n.as_str()) {
                dups.push(n.as_str());
            }
        }
        dups
    }

    /// Field names with the column at `index` dropped.
    pub fn without(&self, index: usize) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != index)
            .map(|(_, n)| n.as_str())
    }

    /// Output header: every field of `first`, then `second` minus its key column.
    pub fn merged(first: &Header, second: &Header, second_key: usize) -> Header {
        Header::new(
            first
                .names
                .iter()
                .map(String::as_str)
                .chain(second.without(second_key)),
        )
    }

    pub fn to_record(&self) -> Record {
        Record::from(self.names.clone())
    }
}

/// Join column resolved against one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: String,
    pub index: usize,
}

impl KeyColumn {
    pub fn resolve(header: &Header, name: &str, path: &Path) -> Result<Self> {
        match header.position(name) {
            Some(index) => Ok(Self {
                name: name.to_string(),
                index,
            }),
            None => Err(JoinError::ColumnNotFound {
                column: name.to_string(),
                path: PathBuf::from(path),
            }),
        }
    }

    /// Key value of `record`; a row too short to hold the key is malformed.
    pub fn value<'r>(&self, record: &'r Record, path: &Path) -> Result<&'r str> {
        record.get(self.index).ok_or_else(|| {
            JoinError::format(
                path,
                format!(
                    "record at line {} has {} fields, key column '{}' is #{}",
                    record.position().map(|p| p.line()).unwrap_or(0),
                    record.len(),
                    self.name,
                    self.index + 1
                ),
            )
        })
    }
}
