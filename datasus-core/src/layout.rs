//! On-disk layout of a run root.
//!
//! ```text
//! {root}/{staging_dir}/   downloaded and intermediate files
//! {root}/{output_dir}/    final CSVs (and the run manifest)
//! {root}/{log_file}       plain-text run log
//! {root}/{gate_file}      JSON run gate record
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Names inside the root, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub staging_dir: String,
    pub output_dir: String,
    pub log_file: String,
    pub gate_file: String,
    /// Write `manifest-YYYY-MM.json` into the output directory.
    pub manifest: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            staging_dir: "staging".into(),
            output_dir: "output".into(),
            log_file: "extraction.log".into(),
            gate_file: "run_gate.json".into(),
            manifest: true,
        }
    }
}

/// Resolved absolute-or-relative paths for one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub gate_file: PathBuf,
    pub write_manifest: bool,
}

impl Layout {
    pub fn resolve(root: impl Into<PathBuf>, config: &LayoutConfig) -> Self {
        let root = root.into();
        Self {
            staging_dir: root.join(&config.staging_dir),
            output_dir: root.join(&config.output_dir),
            log_file: root.join(&config.log_file),
            gate_file: root.join(&config.gate_file),
            write_manifest: config.manifest,
            root,
        }
    }

    /// Create the staging and output directories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.staging_dir)?;
        fs::create_dir_all(&self.output_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
