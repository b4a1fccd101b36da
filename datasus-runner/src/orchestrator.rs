//! Pipeline orchestrator.
//!
//! Sequences one extraction run:
//! gate check → fetch (connect, list) → filter and download → convert each
//! file → finalize (manifest, gate, report, last log flush).
//!
//! Every path except the "already processed" no-op goes through
//! [`Pipeline::finalize`], which records the gate once, attempts the
//! notification and writes the log file last.

use crate::config::PipelineConfig;
use datasus_core::convert::sibling_path;
use datasus_core::manifest::data_hash;
use datasus_core::{
    select_matching, Clock, ConvertError, ConvertedFile, FormatConverter, GateStatus, Layout,
    Notifier, Period, RemoteError, RemoteSource, RunGate, RunLog, RunManifest, SessionGuard,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Orchestrator states. `Aborted` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    GateCheck,
    Fetching,
    Filtering,
    Converting,
    Finalizing,
    Notifying,
    Done,
    Aborted,
}

/// Why a run stopped before conversion.
#[derive(Debug, Error)]
pub enum AbortReason {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("No matching files found with suffix '{suffix}'")]
    NoMatchingFiles { suffix: String },

    #[error("cannot create directories under {root}: {source}")]
    Setup {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of converting one downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub source: String,
    pub result: Result<ConvertedFile, String>,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The gate already names this period; nothing was touched.
    AlreadyProcessed { period: Period },
    Aborted { period: Period, reason: AbortReason },
    Completed { period: Period, files: Vec<FileReport> },
}

impl RunOutcome {
    pub fn period(&self) -> Period {
        match self {
            RunOutcome::AlreadyProcessed { period }
            | RunOutcome::Aborted { period, .. }
            | RunOutcome::Completed { period, .. } => *period,
        }
    }

    /// Fetch succeeded, at least one file matched and every file converted.
    pub fn success(&self) -> bool {
        match self {
            RunOutcome::AlreadyProcessed { .. } => true,
            RunOutcome::Aborted { .. } => false,
            RunOutcome::Completed { files, .. } => {
                !files.is_empty() && files.iter().all(FileReport::succeeded)
            }
        }
    }

    /// 0 success, no-op or partial failure; 1 aborted; 2 nothing converted.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::AlreadyProcessed { .. } => 0,
            RunOutcome::Aborted { .. } => 1,
            RunOutcome::Completed { files, .. } => {
                if files.iter().any(FileReport::succeeded) {
                    0
                } else {
                    2
                }
            }
        }
    }

    pub fn files(&self) -> &[FileReport] {
        match self {
            RunOutcome::Completed { files, .. } => files,
            _ => &[],
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub notified: bool,
    pub gate_recorded: bool,
    /// Every state entered, in order.
    pub states: Vec<RunState>,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// The external systems a run talks to.
pub struct Collaborators<'a> {
    pub remote: &'a dyn RemoteSource,
    pub converter: &'a dyn FormatConverter,
    pub notifier: &'a dyn Notifier,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run even when the gate already names the target period.
    pub force: bool,
}

/// What `datasus status` prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub period: Period,
    pub suffix: String,
    pub gate_file: PathBuf,
    pub gate: GateStatus,
    pub would_run: bool,
}

/// Per-run mutable state threaded through every stage.
struct RunContext<'a> {
    config: &'a PipelineConfig,
    layout: &'a Layout,
    clock: &'a dyn Clock,
    period: Period,
    suffix: String,
    log: RunLog,
    gate: RunGate,
    states: Vec<RunState>,
}

impl RunContext<'_> {
    fn enter(&mut self, next: RunState) {
        let current = self.state();
        if current == RunState::Aborted {
            return;
        }
        tracing::debug!(from = ?current, to = ?next, "state transition");
        self.states.push(next);
    }

    fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Idle)
    }

    /// Write the log file; a failure is reported but never stops the run.
    fn checkpoint(&self) {
        if let Err(e) = self.log.flush() {
            tracing::error!(path = %self.log.path().display(), "could not write run log: {e}");
        }
    }
}

/// One configured pipeline rooted at a directory.
pub struct Pipeline {
    config: PipelineConfig,
    layout: Layout,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let layout = Layout::resolve(root, &config.layout);
        Self {
            config,
            layout,
            clock,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Target period for a run started now.
    pub fn target_period(&self) -> Period {
        Period::from_date(self.clock.now().date(), self.config.period.lag_months)
    }

    fn gate(&self) -> RunGate {
        RunGate::new(&self.layout.gate_file)
    }

    pub fn status(&self) -> StatusReport {
        let period = self.target_period();
        let gate = self.gate();
        let status = gate.status();
        StatusReport {
            period,
            suffix: period.suffix(&self.config.remote.extension),
            gate_file: gate.path().to_path_buf(),
            would_run: status.last_processed() != Some(period),
            gate: status,
        }
    }

    /// Execute one run.
    pub fn run(&self, collaborators: &Collaborators<'_>, options: RunOptions) -> RunSummary {
        let period = self.target_period();
        let mut ctx = RunContext {
            config: &self.config,
            layout: &self.layout,
            clock: self.clock.as_ref(),
            period,
            suffix: period.suffix(&self.config.remote.extension),
            log: RunLog::new(&self.layout.log_file, Arc::clone(&self.clock)),
            gate: self.gate(),
            states: vec![RunState::Idle],
        };

        ctx.enter(RunState::GateCheck);
        if !ctx.gate.should_run(period) {
            if options.force {
                tracing::info!(%period, "gate already records this period; forced run");
            } else {
                tracing::info!(%period, "period already processed; nothing to do");
                ctx.enter(RunState::Aborted);
                return RunSummary {
                    outcome: RunOutcome::AlreadyProcessed { period },
                    notified: false,
                    gate_recorded: false,
                    states: ctx.states,
                };
            }
        }

        ctx.log.append(format!(
            "Starting extraction for period {period} (suffix '{}')",
            ctx.suffix
        ));

        let outcome = match fetch(&mut ctx, collaborators.remote) {
            Ok(downloaded) => {
                let files = convert_all(&mut ctx, collaborators.converter, &downloaded);
                RunOutcome::Completed { period, files }
            }
            Err(reason) => {
                ctx.log.append_failure(format!("Process failure: {reason}"));
                ctx.checkpoint();
                ctx.enter(RunState::Aborted);
                RunOutcome::Aborted { period, reason }
            }
        };

        Self::finalize(ctx, outcome, collaborators.notifier)
    }

    /// Shared tail of every non-no-op run.
    fn finalize(
        mut ctx: RunContext<'_>,
        outcome: RunOutcome,
        notifier: &dyn Notifier,
    ) -> RunSummary {
        ctx.enter(RunState::Finalizing);

        if ctx.layout.write_manifest {
            write_manifest(&mut ctx, outcome.files());
        }

        let gate_recorded = match ctx.gate.record_processed(ctx.period) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("run gate not recorded: {e}");
                ctx.log.append_failure(format!("Could not record run gate: {e}"));
                false
            }
        };

        let success = outcome.success();
        ctx.checkpoint();

        ctx.enter(RunState::Notifying);
        let report = ctx.config.report.compose(success, ctx.log.render());
        let notified = match notifier.send(&report) {
            Ok(()) => {
                ctx.log.append("Report e-mail sent.");
                true
            }
            Err(e) => {
                ctx.log.append_failure(format!("Error sending report e-mail: {e}"));
                false
            }
        };

        ctx.enter(RunState::Done);
        ctx.checkpoint();

        RunSummary {
            outcome,
            notified,
            gate_recorded,
            states: ctx.states,
        }
    }
}

/// Connect, list, filter and download. Returns the downloaded names in
/// listing order.
fn fetch(ctx: &mut RunContext<'_>, remote: &dyn RemoteSource) -> Result<Vec<String>, AbortReason> {
    ctx.enter(RunState::Fetching);
    let (config, layout) = (ctx.config, ctx.layout);
    layout.ensure_dirs().map_err(|source| AbortReason::Setup {
        root: layout.root().to_path_buf(),
        source,
    })?;

    let remote_cfg = &config.remote;
    ctx.log.append(format!("Connecting to FTP: {}", remote.name()));
    let mut session = SessionGuard::new(remote.connect()?);

    ctx.log.append(format!("Changing to directory: {}", remote_cfg.directory));
    let listing = session.list(&remote_cfg.directory)?;

    ctx.enter(RunState::Filtering);
    let selected = select_matching(&listing, &remote_cfg.prefix, &ctx.suffix);
    ctx.log.append(format!(
        "Files found with suffix '{}': {}",
        ctx.suffix,
        selected.len()
    ));
    if selected.is_empty() {
        return Err(AbortReason::NoMatchingFiles {
            suffix: ctx.suffix.clone(),
        });
    }

    for name in &selected {
        ctx.log.append(format!("Downloading: {name}"));
        let bytes = session.download(name, &layout.staging_dir.join(name))?;
        tracing::debug!(file = %name, bytes, "downloaded");
    }
    ctx.log.append("Download complete.");
    Ok(selected)
}

fn convert_all(
    ctx: &mut RunContext<'_>,
    converter: &dyn FormatConverter,
    downloaded: &[String],
) -> Vec<FileReport> {
    ctx.enter(RunState::Converting);

    let mut reports = Vec::with_capacity(downloaded.len());
    for name in downloaded {
        let result = match convert_one(ctx, converter, name) {
            Ok(file) => {
                ctx.log.append(format!(
                    "File converted and moved: {}",
                    ctx.layout.output_dir.join(&file.output).display()
                ));
                Ok(file)
            }
            Err(e) => {
                ctx.log.append_failure(format!("Error processing {name}: {e}"));
                Err(e.to_string())
            }
        };
        reports.push(FileReport {
            source: name.clone(),
            result,
        });
    }

    ctx.checkpoint();
    reports
}

/// Decompress, parse, serialize, move, clean up. On failure the raw download
/// is kept and any partial intermediates are removed.
fn convert_one(
    ctx: &mut RunContext<'_>,
    converter: &dyn FormatConverter,
    name: &str,
) -> Result<ConvertedFile, ConvertError> {
    let layout = ctx.layout;
    let staging = &layout.staging_dir;
    let raw = staging.join(name);
    let structured = sibling_path(staging, name, converter.structured_extension());
    let staged_output = sibling_path(staging, name, converter.output_extension());

    let converted = (|| {
        converter.decompress(&raw, &structured)?;
        let table = converter.parse(&structured)?;
        converter.serialize(&table, &staged_output)?;
        Ok::<_, ConvertError>(table.row_count())
    })();

    let rows = match converted {
        Ok(rows) => rows,
        Err(e) => {
            remove_if_present(&structured);
            remove_if_present(&staged_output);
            return Err(e);
        }
    };
    ctx.log.append(format!("Converted {name} ({rows} records)"));

    let output_name = staged_output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let destination = layout.output_dir.join(&output_name);

    if let Err(e) = move_file(&staged_output, &destination) {
        remove_if_present(&structured);
        remove_if_present(&staged_output);
        return Err(e);
    }
    let bytes = match fs::read(&destination) {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_if_present(&structured);
            remove_if_present(&destination);
            return Err(ConvertError::io(&destination, e));
        }
    };

    // Raw and structured files are removed only once the output is in place.
    remove_if_present(&raw);
    remove_if_present(&structured);

    Ok(ConvertedFile {
        source: name.to_string(),
        output: output_name,
        rows,
        data_hash: data_hash(&bytes),
        converted_at: ctx.clock.now(),
    })
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove staged file: {e}"),
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), ConvertError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| ConvertError::io(to, e))?;
    fs::remove_file(from).map_err(|e| ConvertError::io(from, e))
}

fn write_manifest(ctx: &mut RunContext<'_>, files: &[FileReport]) {
    let converted: Vec<ConvertedFile> = files
        .iter()
        .filter_map(|f| f.result.as_ref().ok().cloned())
        .collect();
    if converted.is_empty() {
        return;
    }

    let manifest = RunManifest {
        period: ctx.period,
        files: converted,
    };
    match manifest.write(&ctx.layout.output_dir) {
        Ok(path) => tracing::debug!(path = %path.display(), "manifest written"),
        Err(e) => ctx
            .log
            .append_failure(format!("Could not write run manifest: {e}")),
    }
}
