//! DATASUS CLI: monthly extraction run and gate status.
//!
//! Commands:
//! - `run`: fetch the target period's files, convert them to CSV, notify
//! - `status`: show the target period and whether a run would proceed
//!
//! Exit codes: 0 success, no-op or partial failure; 1 aborted run;
//! 2 no file converted; 3 configuration or startup error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datasus_core::{DbcConverter, DisabledNotifier, GateStatus, Notifier, SystemClock};
use datasus_runner::{
    Collaborators, FtpSource, Pipeline, PipelineConfig, RunOptions, RunOutcome, SmtpNotifier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "datasus.toml";
const EXIT_STARTUP: i32 = 3;

#[derive(Parser)]
#[command(
    name = "datasus",
    about = "DATASUS monthly extraction: FTP download, DBC to CSV, e-mail report"
)]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction for the current target period.
    Run {
        /// TOML config file. Defaults to <root>/datasus.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory holding staging, output, log and gate files.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Run even if the gate already records this period.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Show the target period, gate record and whether a run would proceed.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Run {
            config,
            root,
            force,
        } => run_cmd(config.as_deref(), &root, force),
        Commands::Status { config, root } => status_cmd(config.as_deref(), &root).map(|()| 0),
    }
    .unwrap_or_else(|e| {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        EXIT_STARTUP
    });

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Explicit path must exist; otherwise `<root>/datasus.toml` if present, else
/// built-in defaults.
fn load_config(explicit: Option<&Path>, root: &Path) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let candidate = root.join(DEFAULT_CONFIG);
    if candidate.is_file() {
        return PipelineConfig::from_file(&candidate)
            .with_context(|| format!("loading config {}", candidate.display()));
    }
    tracing::debug!("no {DEFAULT_CONFIG} under {}; using defaults", root.display());
    Ok(PipelineConfig::default())
}

fn run_cmd(config_path: Option<&Path>, root: &Path, force: bool) -> Result<i32> {
    let config = load_config(config_path, root)?;

    let remote = FtpSource::new(config.remote.clone());
    let converter = DbcConverter;
    let notifier: Box<dyn Notifier> = match &config.mail {
        Some(mail) => Box::new(SmtpNotifier::new(mail.clone())),
        None => Box::new(DisabledNotifier),
    };

    let pipeline = Pipeline::new(config, root, Arc::new(SystemClock));
    let summary = pipeline.run(
        &Collaborators {
            remote: &remote,
            converter: &converter,
            notifier: notifier.as_ref(),
        },
        RunOptions { force },
    );

    print_summary(&summary.outcome);
    if !summary.notified && !matches!(summary.outcome, RunOutcome::AlreadyProcessed { .. }) {
        println!("Report not sent (see log)");
    }
    Ok(summary.exit_code())
}

fn print_summary(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::AlreadyProcessed { period } => {
            println!("Period {period} already processed; nothing to do.");
        }
        RunOutcome::Aborted { period, reason } => {
            println!("Period {period}: run aborted: {reason}");
        }
        RunOutcome::Completed { period, files } => {
            let converted = files.iter().filter(|f| f.succeeded()).count();
            println!("Period {period}: {converted}/{} files converted", files.len());
            for file in files {
                match &file.result {
                    Ok(done) => {
                        println!("  {:<16} {:>9} rows  {}", done.source, done.rows, done.output)
                    }
                    Err(e) => println!("  {:<16} FAILED  {e}", file.source),
                }
            }
        }
    }
}

fn status_cmd(config_path: Option<&Path>, root: &Path) -> Result<()> {
    let config = load_config(config_path, root)?;
    let pipeline = Pipeline::new(config, root, Arc::new(SystemClock));
    let status = pipeline.status();

    println!("Target period: {}", status.period);
    println!("File suffix:   {}", status.suffix);
    println!("Gate file:     {}", status.gate_file.display());
    match &status.gate {
        GateStatus::NeverRun => println!("Last processed: never"),
        GateStatus::Processed(period) => println!("Last processed: {period}"),
        GateStatus::Unreadable(reason) => {
            println!("Last processed: unknown (record ignored: {reason})")
        }
    }
    println!(
        "Next run:      {}",
        if status.would_run {
            "would proceed"
        } else {
            "no-op (already processed)"
        }
    );
    Ok(())
}
