//! In-memory collaborators for orchestrator tests.
//!
//! Each double records the calls it receives so tests can assert both what
//! happened and what did not.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use datasus_core::{
    Clock, ConvertError, FixedClock, FormatConverter, Notifier, NotifyError, RemoteError,
    RemoteSession, RemoteSource, Report, Table,
};
use datasus_runner::{Collaborators, Pipeline, PipelineConfig};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

pub type CallLog = Rc<RefCell<Vec<String>>>;

/// 2025-06-18 10:00, advancing 1 ms per reading.
pub fn run_instant() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 18)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

pub fn clock_at(at: NaiveDateTime) -> Arc<dyn Clock> {
    Arc::new(FixedClock::with_step(at, Duration::milliseconds(1)))
}

pub fn pipeline(root: &Path) -> Pipeline {
    Pipeline::new(PipelineConfig::default(), root, clock_at(run_instant()))
}

// ── Remote ──

#[derive(Default, Clone)]
pub struct MemoryRemote {
    pub listing: Vec<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub refuse_connection: bool,
    pub fail_listing: bool,
    pub fail_download: Option<String>,
    pub calls: CallLog,
}

impl MemoryRemote {
    /// Remote serving `files` in the given listing order.
    pub fn serving(files: &[(&str, &str)]) -> Self {
        Self {
            listing: files.iter().map(|(name, _)| name.to_string()).collect(),
            files: files
                .iter()
                .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl RemoteSource for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        self.calls.borrow_mut().push("connect".into());
        if self.refuse_connection {
            return Err(RemoteError::Connection {
                host: "memory".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(MemorySession {
            remote: self.clone(),
        }))
    }
}

struct MemorySession {
    remote: MemoryRemote,
}

impl RemoteSession for MemorySession {
    fn list(&mut self, directory: &str) -> Result<Vec<String>, RemoteError> {
        self.remote.calls.borrow_mut().push(format!("list {directory}"));
        if self.remote.fail_listing {
            return Err(RemoteError::List {
                directory: directory.into(),
                reason: "550 no such directory".into(),
            });
        }
        Ok(self.remote.listing.clone())
    }

    fn download(&mut self, file: &str, dest: &Path) -> Result<u64, RemoteError> {
        self.remote.calls.borrow_mut().push(format!("download {file}"));
        let transfer_err = |reason: &str| RemoteError::Transfer {
            file: file.into(),
            reason: reason.into(),
        };
        if self.remote.fail_download.as_deref() == Some(file) {
            return Err(transfer_err("426 connection closed"));
        }
        let body = self
            .remote
            .files
            .get(file)
            .ok_or_else(|| transfer_err("550 not found"))?;
        fs::write(dest, body).map_err(|e| transfer_err(&e.to_string()))?;
        Ok(body.len() as u64)
    }

    fn close(&mut self) {
        self.remote.calls.borrow_mut().push("close".into());
    }
}

// ── Converter ──

/// Treats the raw file as comma-separated text. Any file containing
/// `CORRUPT` fails at decompression.
#[derive(Default)]
pub struct TextConverter {
    pub calls: RefCell<Vec<String>>,
}

impl TextConverter {
    pub fn count(&self, stage: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(stage))
            .count()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl FormatConverter for TextConverter {
    fn decompress(&self, raw: &Path, structured: &Path) -> Result<(), ConvertError> {
        self.calls
            .borrow_mut()
            .push(format!("decompress {}", file_name(raw)));
        let data = fs::read_to_string(raw).map_err(|e| ConvertError::io(raw, e))?;
        if data.contains("CORRUPT") {
            // Partial output left behind, as a real decompressor might.
            fs::write(structured, "partial").map_err(|e| ConvertError::io(structured, e))?;
            return Err(ConvertError::Decompress("invalid literal table".into()));
        }
        fs::write(structured, data).map_err(|e| ConvertError::io(structured, e))
    }

    fn parse(&self, structured: &Path) -> Result<Table, ConvertError> {
        self.calls
            .borrow_mut()
            .push(format!("parse {}", file_name(structured)));
        let data = fs::read_to_string(structured).map_err(|e| ConvertError::io(structured, e))?;
        let mut lines = data.lines();
        let header = lines
            .next()
            .ok_or_else(|| ConvertError::Malformed("empty file".into()))?;
        let mut table = Table::new(header.split(',').map(str::to_string).collect());
        table.rows = lines
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect();
        Ok(table)
    }

    fn serialize(&self, table: &Table, output: &Path) -> Result<(), ConvertError> {
        self.calls
            .borrow_mut()
            .push(format!("serialize {}", file_name(output)));
        table.write_csv(output)
    }
}

// ── Notifier ──

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Report>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<Report> {
        self.sent.borrow().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, report: &Report) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(report.clone());
        if self.fail {
            return Err(NotifyError::Transport("535 authentication failed".into()));
        }
        Ok(())
    }
}

pub fn collaborators<'a>(
    remote: &'a MemoryRemote,
    converter: &'a TextConverter,
    notifier: &'a RecordingNotifier,
) -> Collaborators<'a> {
    Collaborators {
        remote,
        converter,
        notifier,
    }
}
