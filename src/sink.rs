//! Append-only CSV files for the catalog index and the part records.

use crate::error::SinkError;
use crate::models::{CatalogIndexRow, FIRST_DATA_ROW};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for rows of one kind
pub trait RowSink<T> {
    fn write_row(&mut self, row: &T) -> Result<(), SinkError>;

    /// Make everything written so far durable
    fn flush(&mut self) -> Result<(), SinkError>;
}

impl<T: Clone> RowSink<T> for Vec<T> {
    fn write_row(&mut self, row: &T) -> Result<(), SinkError> {
        self.push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// CSV file opened for appending, with every field quoted.
///
/// The header is written only when the file is new or empty, so reopening an
/// existing file continues it without repeating the header.
pub struct CsvSink<W: Write = File> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl CsvSink<File> {
    pub fn append(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let is_empty = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!(
            "Appending to {} ({})",
            path.display(),
            if is_empty { "new file" } else { "existing rows kept" }
        );
        Ok(Self::from_writer(file, is_empty))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W, write_header: bool) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(writer);
        Self {
            writer,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

impl<T: Serialize, W: Write> RowSink<T> for CsvSink<W> {
    fn write_row(&mut self, row: &T) -> Result<(), SinkError> {
        self.writer.serialize(row)?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// A data row of the catalog index with its 1-based row number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub row_number: u64,
    pub row: Result<CatalogIndexRow, MalformedRow>,
}

/// Index row that could not be turned into a [`CatalogIndexRow`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed index row {row_number}: {reason}")]
pub struct MalformedRow {
    pub row_number: u64,
    pub reason: String,
}

/// Reads the catalog index positionally, so older header names still work
pub struct IndexReader {
    path: PathBuf,
}

impl IndexReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn entries(&self) -> Result<impl Iterator<Item = IndexEntry>, SinkError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        Ok(index_entries(reader))
    }
}

fn index_entries<R: std::io::Read>(reader: csv::Reader<R>) -> impl Iterator<Item = IndexEntry> {
    reader
        .into_records()
        .enumerate()
        .map(|(i, record)| {
            let row_number = i as u64 + FIRST_DATA_ROW;
            let row = match record {
                Ok(record) if record.len() >= 6 => Ok(CatalogIndexRow {
                    brand: record[0].to_string(),
                    kind: record[1].to_string(),
                    year: record[2].to_string(),
                    model: record[3].to_string(),
                    diagram_label: record[4].to_string(),
                    diagram_locator: record[5].to_string(),
                }),
                Ok(record) => Err(MalformedRow {
                    row_number,
                    reason: format!("expected 6 fields, found {}", record.len()),
                }),
                Err(e) => Err(MalformedRow {
                    row_number,
                    reason: e.to_string(),
                }),
            };
            IndexEntry { row_number, row }
        })
}

/// Index entries read from any reader, e.g. an in-memory buffer
pub fn read_index_from<R: std::io::Read>(input: R) -> impl Iterator<Item = IndexEntry> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    index_entries(reader)
}

/// Last data row of a CSV file with a header, if any
pub fn last_record(path: &Path) -> Result<Option<csv::StringRecord>, SinkError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut last = None;
    for record in reader.records() {
        last = Some(record?);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: usize) -> CatalogIndexRow {
        CatalogIndexRow {
            brand: "Lynx".to_string(),
            kind: "Snowmobile".to_string(),
            year: "2005".to_string(),
            model: String::new(),
            diagram_label: format!("Diagram {}", n),
            diagram_locator: format!("LNX/{}", n),
        }
    }

    #[test]
    fn test_header_and_quoting() {
        let mut sink = CsvSink::from_writer(Vec::new(), true);
        sink.write_row(&row(1)).unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some(r#""Brand","Type","Year","Model","DiagramName","DiagramLocator""#)
        );
        assert_eq!(
            lines.next(),
            Some(r#""Lynx","Snowmobile","2005","","Diagram 1","LNX/1""#)
        );
    }

    #[test]
    fn test_no_header_when_continuing() {
        let mut sink = CsvSink::from_writer(Vec::new(), false);
        sink.write_row(&row(1)).unwrap();
        assert_eq!(sink.rows_written(), 1);
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with(r#""Lynx""#));
    }

    #[test]
    fn test_index_rows_are_numbered_from_two() {
        let data = "Brand,Type,Year,Model,Diagram Name,Diagram URL\n\
                    Lynx,Snowmobile,2005,,Engine,LNX/1\n\
                    Lynx,Snowmobile\n\
                    Lynx,Snowmobile,2005,,Track,LNX/2\n";
        let entries: Vec<_> = read_index_from(data.as_bytes()).collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].row_number, 2);
        assert_eq!(entries[0].row.as_ref().unwrap().diagram_locator, "LNX/1");
        assert!(entries[1].row.is_err());
        assert_eq!(entries[2].row_number, 4);
    }
}
