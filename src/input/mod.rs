//! Header and dialect loading for delimited input files.
//!
//! Every file is sniffed once. Files derived from it (partition shards) are
//! read back with the same [`FormatDescriptor`], never re-sniffed.

pub mod sniff;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{JoinError, Result};
use crate::models::{Header, Record};

pub use sniff::{SNIFF_BYTES, sniff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Lf,
    CrLf,
}

/// Delimiter/quote/escape/terminator conventions of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub delimiter: u8,
    pub quote: u8,
    pub double_quote: bool,
    pub escape: Option<u8>,
    pub terminator: Terminator,
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            double_quote: true,
            escape: None,
            terminator: Terminator::Lf,
        }
    }
}

impl FormatDescriptor {
    /// Strict reader: the header comes back as an ordinary record and every
    /// record must be as wide as the first.
    pub fn reader_builder(&self) -> ReaderBuilder {
        let mut b = ReaderBuilder::new();
        b.delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(self.double_quote)
            .escape(self.escape)
            .has_headers(false)
            .flexible(false);
        b
    }

    pub fn writer_builder(&self) -> WriterBuilder {
        let mut b = WriterBuilder::new();
        b.delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(self.double_quote)
            .has_headers(false)
            .terminator(match self.terminator {
                Terminator::Lf => csv::Terminator::Any(b'\n'),
                Terminator::CrLf => csv::Terminator::CRLF,
            });
        if let Some(e) = self.escape {
            b.escape(e);
        }
        b
    }
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => JoinError::NotFound {
            path: path.to_path_buf(),
        },
        _ => JoinError::Io(e),
    })
}

/// Read the header row of `path` and sniff its format from the first
/// [`SNIFF_BYTES`] bytes.
pub fn load_header(path: &Path) -> Result<(Header, FormatDescriptor)> {
    if !path.is_file() {
        return Err(JoinError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let mut buffered = BufReader::new(open_input(path)?);

    // the csv reader ignores empty lines, so the sample starts after them
    loop {
        let buf = buffered.fill_buf()?;
        let blank = buf.iter().take_while(|b| matches!(b, b'\n' | b'\r')).count();
        if blank == 0 {
            break;
        }
        buffered.consume(blank);
    }

    let mut sample = Vec::with_capacity(SNIFF_BYTES + 1);
    (&mut buffered)
        .take(SNIFF_BYTES as u64 + 1)
        .read_to_end(&mut sample)?;
    let truncated = sample.len() > SNIFF_BYTES;
    sample.truncate(SNIFF_BYTES);
    if sample.iter().all(|b| b.is_ascii_whitespace()) {
        let reason = if truncated {
            "no header row in the first 1KB"
        } else {
            "file is empty"
        };
        return Err(JoinError::format(path, reason));
    }

    let format = sniff(&sample, truncated);
    let mut file = buffered.into_inner();
    file.seek(SeekFrom::Start(0))?;
    let mut rdr = format.reader_builder().from_reader(file);
    let mut rec = Record::new();
    let found = rdr
        .read_record(&mut rec)
        .map_err(|e| JoinError::format(path, format!("unreadable header: {e}")))?;
    if !found {
        return Err(JoinError::format(path, "no header row"));
    }

    let header = Header::new(rec.iter().enumerate().map(|(i, f)| {
        if i == 0 {
            f.trim_start_matches('\u{feff}')
        } else {
            f
        }
    }));
    if header.names().iter().all(|n| n.is_empty()) {
        return Err(JoinError::format(path, "header has no columns"));
    }
    let dups = header.duplicates();
    if !dups.is_empty() {
        log::warn!(
            "{}: duplicate column names {:?}; the first occurrence is used",
            path.display(),
            dups
        );
    }
    log::debug!(
        "{}: {} columns, delimiter={:?} quote={:?} escape={:?} {:?}",
        path.display(),
        header.len(),
        format.delimiter as char,
        format.quote as char,
        format.escape.map(|e| e as char),
        format.terminator
    );
    Ok((header, format))
}

/// Open `path` for record reading with a known format. The header is the first record.
pub fn open_records(path: &Path, format: &FormatDescriptor) -> Result<csv::Reader<File>> {
    let file = open_input(path)?;
    Ok(format.reader_builder().from_reader(file))
}

/// Rewind `rdr` to byte 0 and consume the header row.
pub fn rewind_past_header(rdr: &mut csv::Reader<File>, scratch: &mut Record) -> Result<()> {
    rdr.seek(csv::Position::new())?;
    rdr.read_record(scratch)?;
    Ok(())
}
