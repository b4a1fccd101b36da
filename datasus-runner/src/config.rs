//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file describes the standard
//! DATASUS SIH/SUS extraction with notification disabled.

use datasus_core::{LayoutConfig, ReportTemplate, DEFAULT_LAG_MONTHS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub remote: RemoteConfig,
    pub period: PeriodConfig,
    pub layout: LayoutConfig,
    pub report: ReportTemplate,
    /// SMTP transport. Absent means reports are not sent.
    pub mail: Option<MailConfig>,
}

/// Remote FTP source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub directory: String,
    /// Listed names must start with this.
    pub prefix: String,
    /// Appended to the `YYMM` period suffix.
    pub extension: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "ftp.datasus.gov.br".into(),
            port: 21,
            user: "anonymous".into(),
            password: String::new(),
            directory: "/dissemin/publicos/SIHSUS/200801_/Dados/".into(),
            prefix: "SP".into(),
            extension: ".dbc".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    /// Months between the run date and the targeted dataset.
    pub lag_months: u32,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            lag_months: DEFAULT_LAG_MONTHS,
        }
    }
}

/// SMTP relay settings. The password is never stored in the file; it is
/// read from the environment variable named by `password_env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    pub sender: String,
    pub recipients: Vec<String>,
    pub relay: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Login name; defaults to `sender`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl MailConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.sender)
    }

    /// Password from the configured environment variable, if set.
    pub fn password(&self) -> Option<String> {
        let var = self.password_env.as_deref()?;
        std::env::var(var).ok().filter(|p| !p.is_empty())
    }
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.host.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.host is empty".into()));
        }
        if self.remote.extension.is_empty() {
            return Err(ConfigError::Invalid("remote.extension is empty".into()));
        }
        if self.period.lag_months > 120 {
            return Err(ConfigError::Invalid(format!(
                "period.lag_months = {} is implausible",
                self.period.lag_months
            )));
        }
        let names = [
            ("layout.staging_dir", &self.layout.staging_dir),
            ("layout.output_dir", &self.layout.output_dir),
            ("layout.log_file", &self.layout.log_file),
            ("layout.gate_file", &self.layout.gate_file),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} is empty")));
            }
        }
        if self.layout.staging_dir == self.layout.output_dir {
            return Err(ConfigError::Invalid(
                "layout.staging_dir and layout.output_dir must differ".into(),
            ));
        }
        if let Some(mail) = &self.mail {
            if mail.recipients.is_empty() {
                return Err(ConfigError::Invalid("mail.recipients is empty".into()));
            }
            if mail.relay.trim().is_empty() {
                return Err(ConfigError::Invalid("mail.relay is empty".into()));
            }
        }
        Ok(())
    }
}
