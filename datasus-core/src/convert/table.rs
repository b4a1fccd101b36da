//! In-memory table and its CSV serialization.

use super::ConvertError;
use std::fs;
use std::io;
use std::path::Path;

/// Column names plus rows of already-rendered text values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Stream the header row then one line per record into `writer`,
    /// handing it back once everything is flushed.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<W, ConvertError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner().map_err(|e| ConvertError::Csv(e.into_error().into()))
    }

    /// CSV bytes: header row then one line per record.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, ConvertError> {
        self.write_to(Vec::new())
    }

    /// Write the table as CSV to `path`, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<(), ConvertError> {
        let file = fs::File::create(path).map_err(|e| ConvertError::io(path, e))?;
        self.write_to(file)?;
        Ok(())
    }
}
