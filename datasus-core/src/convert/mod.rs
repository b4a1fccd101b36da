//! Format conversion: DBC → DBF → records → CSV.
//!
//! The [`FormatConverter`] trait is the seam the orchestrator drives, one
//! stage at a time, so it can clean up intermediates and isolate failures per
//! file. [`DbcConverter`] is the production implementation.

pub mod dbc;
pub mod dbf;
pub mod table;

pub use table::Table;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conversion errors, all scoped to a single file.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("malformed table file: {0}")]
    Malformed(String),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
}

impl ConvertError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The three conversion stages.
pub trait FormatConverter {
    /// Extension of the decompressed structured file, with leading dot.
    fn structured_extension(&self) -> &str {
        ".dbf"
    }

    /// Extension of the serialized output, with leading dot.
    fn output_extension(&self) -> &str {
        ".csv"
    }

    /// Decompress `raw` into `structured`.
    fn decompress(&self, raw: &Path, structured: &Path) -> Result<(), ConvertError>;

    /// Read the structured file into memory.
    fn parse(&self, structured: &Path) -> Result<Table, ConvertError>;

    /// Write `table` to `output`.
    fn serialize(&self, table: &Table, output: &Path) -> Result<(), ConvertError>;
}

/// DATASUS DBC files → CSV.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbcConverter;

impl FormatConverter for DbcConverter {
    fn decompress(&self, raw: &Path, structured: &Path) -> Result<(), ConvertError> {
        dbc::decompress_file(raw, structured)
    }

    fn parse(&self, structured: &Path) -> Result<Table, ConvertError> {
        dbf::read_file(structured)
    }

    fn serialize(&self, table: &Table, output: &Path) -> Result<(), ConvertError> {
        table.write_csv(output)
    }
}

/// `dir/<stem><extension>` for a source filename like `SPGO2504.dbc`.
pub fn sibling_path(dir: &Path, source_name: &str, extension: &str) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name);
    dir.join(format!("{stem}{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_path_swaps_extension() {
        let dir = Path::new("/data/out");
        assert_eq!(
            sibling_path(dir, "SPGO2504.dbc", ".csv"),
            PathBuf::from("/data/out/SPGO2504.csv")
        );
        assert_eq!(
            sibling_path(dir, "NOEXT", ".dbf"),
            PathBuf::from("/data/out/NOEXT.dbf")
        );
    }

    #[test]
    fn default_extensions() {
        assert_eq!(DbcConverter.structured_extension(), ".dbf");
        assert_eq!(DbcConverter.output_extension(), ".csv");
    }
}
