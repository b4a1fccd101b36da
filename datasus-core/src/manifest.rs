//! Run manifest: a JSON sidecar describing the files a run produced.
//!
//! Layout: `{output_dir}/manifest-{YYYY-MM}.json`

use crate::period::Period;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One converted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub source: String,
    pub output: String,
    pub rows: usize,
    pub data_hash: String,
    pub converted_at: NaiveDateTime,
}

/// Manifest for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub period: Period,
    pub files: Vec<ConvertedFile>,
}

/// BLAKE3 hex digest of `data`.
pub fn data_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

impl RunManifest {
    pub fn path_in(output_dir: &Path, period: Period) -> PathBuf {
        output_dir.join(format!("manifest-{}.json", period.key()))
    }

    /// Write to `{output_dir}/manifest-{period}.json`, returning the path.
    pub fn write(&self, output_dir: &Path) -> io::Result<PathBuf> {
        let path = Self::path_in(output_dir, self.period);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
