//! DATASUS Runner: configuration, production adapters and the orchestrator.
//!
//! This crate builds on `datasus-core` to provide:
//! - TOML pipeline configuration
//! - FTP remote source (`suppaftp`)
//! - SMTP notifier (`lettre`)
//! - The run orchestrator and its outcome types

pub mod config;
pub mod ftp;
pub mod orchestrator;
pub mod smtp;

pub use config::{ConfigError, MailConfig, PeriodConfig, PipelineConfig, RemoteConfig};
pub use ftp::{FtpSession, FtpSource};
pub use orchestrator::{
    AbortReason, Collaborators, FileReport, Pipeline, RunOptions, RunOutcome, RunState,
    RunSummary, StatusReport,
};
pub use smtp::SmtpNotifier;
