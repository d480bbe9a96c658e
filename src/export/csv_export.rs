use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use csv::{Writer, WriterBuilder};

use crate::error::{JoinError, Result};
use crate::input::FormatDescriptor;
use crate::models::{Header, Record};
use crate::orchestrator::summary::RunSummary;

/// Streaming sink for joined rows, written in the first input's format.
pub struct JoinedCsvWriter<W: Write> {
    writer: Writer<W>,
    rows: u64,
}

impl<W: Write> JoinedCsvWriter<W> {
    pub fn from_writer(inner: W, format: &FormatDescriptor) -> Self {
        Self {
            writer: format.writer_builder().from_writer(inner),
            rows: 0,
        }
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        self.writer.write_record(header.names())?;
        Ok(())
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.writer.write_record(record)?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush_partial(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| JoinError::Io(io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

/// Write `summary` as a header row plus one data row.
pub fn export_summary_csv(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path)?;
    let mut w = WriterBuilder::new().from_writer(BufWriter::new(file));
    w.serialize(summary)?;
    w.flush()?;
    Ok(())
}
