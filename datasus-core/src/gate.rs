//! Run gate: at most one full pipeline run per period.
//!
//! Layout: a single JSON record, `{"lastProcessedPeriod": "YYYY-MM"}`.
//!
//! Reading never fails: a missing, unreadable, malformed or older-format file
//! is reported as "no prior run". Writes are atomic (write to .tmp, rename).

use crate::period::Period;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persisted gate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateState {
    pub last_processed_period: Period,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("gate serialization: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("gate write to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// What the gate file currently says, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
    NeverRun,
    Processed(Period),
    /// The file exists but could not be used; treated as never run.
    Unreadable(String),
}

impl GateStatus {
    pub fn last_processed(&self) -> Option<Period> {
        match self {
            GateStatus::Processed(period) => Some(*period),
            _ => None,
        }
    }
}

/// File-backed run gate.
#[derive(Debug, Clone)]
pub struct RunGate {
    path: PathBuf,
}

impl RunGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inspect the stored record without failing.
    pub fn status(&self) -> GateStatus {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return GateStatus::NeverRun,
            Err(e) => return GateStatus::Unreadable(format!("read: {e}")),
        };
        match serde_json::from_str::<GateState>(&content) {
            Ok(state) => GateStatus::Processed(state.last_processed_period),
            Err(e) => GateStatus::Unreadable(format!("parse: {e}")),
        }
    }

    /// `true` unless the stored record names exactly `period`.
    pub fn should_run(&self, period: Period) -> bool {
        match self.status() {
            GateStatus::Processed(last) => last != period,
            GateStatus::NeverRun => true,
            GateStatus::Unreadable(reason) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %reason,
                    "ignoring unusable run gate record"
                );
                true
            }
        }
    }

    /// Overwrite the record with `period`.
    pub fn record_processed(&self, period: Period) -> Result<(), GateError> {
        let state = GateState {
            last_processed_period: period,
        };
        let json = serde_json::to_string_pretty(&state)?;
        let write_err = |source| GateError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            write_err(e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn april() -> Period {
        Period::new(2025, 4).unwrap()
    }

    fn gate_in(dir: &TempDir) -> RunGate {
        RunGate::new(dir.path().join("run_gate.json"))
    }

    #[test]
    fn missing_file_allows_run() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        assert_eq!(gate.status(), GateStatus::NeverRun);
        assert!(gate.should_run(april()));
    }

    #[test]
    fn recorded_period_blocks_same_period_only() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        gate.record_processed(april()).unwrap();

        assert!(!gate.should_run(april()));
        assert!(gate.should_run(Period::new(2025, 5).unwrap()));
        assert_eq!(gate.status().last_processed(), Some(april()));
    }

    #[test]
    fn record_uses_documented_schema() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        gate.record_processed(april()).unwrap();

        let raw = fs::read_to_string(gate.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["lastProcessedPeriod"], "2025-04");
        assert!(!dir.path().join("run_gate.json.tmp").exists());
    }

    #[test]
    fn record_overwrites_previous_period() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        gate.record_processed(Period::new(2025, 3).unwrap()).unwrap();
        gate.record_processed(april()).unwrap();
        assert_eq!(gate.status(), GateStatus::Processed(april()));
    }

    #[test]
    fn corrupted_file_allows_run() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        fs::write(gate.path(), "{not json").unwrap();

        assert!(matches!(gate.status(), GateStatus::Unreadable(_)));
        assert!(gate.should_run(april()));
    }

    #[test]
    fn older_format_is_treated_as_never_run() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        fs::write(gate.path(), r#"{"ultimo_processamento": "2025-06"}"#).unwrap();
        assert!(gate.should_run(april()));

        fs::write(gate.path(), r#"{"lastProcessedPeriod": "June 2025"}"#).unwrap();
        assert!(gate.should_run(april()));
    }

    #[test]
    fn directory_in_place_of_file_allows_run() {
        let dir = TempDir::new().unwrap();
        let gate = gate_in(&dir);
        fs::create_dir_all(gate.path()).unwrap();
        assert!(gate.should_run(april()));
    }

    #[test]
    fn record_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let gate = RunGate::new(dir.path().join("state/nested/gate.json"));
        gate.record_processed(april()).unwrap();
        assert!(!gate.should_run(april()));
    }
}
