//! FTP remote source backed by `suppaftp`.
//!
//! One session = one control connection: login, binary mode, `CWD` + `NLST`
//! for listing, `RETR` per file, `QUIT` on close (or drop).

use crate::config::RemoteConfig;
use datasus_core::{RemoteError, RemoteSession, RemoteSource};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

pub struct FtpSource {
    config: RemoteConfig,
}

impl FtpSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    fn connection_error(&self, reason: impl ToString) -> RemoteError {
        RemoteError::Connection {
            host: self.config.host.clone(),
            reason: reason.to_string(),
        }
    }
}

impl RemoteSource for FtpSource {
    fn name(&self) -> &str {
        &self.config.host
    }

    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let mut stream = FtpStream::connect((self.config.host.as_str(), self.config.port))
            .map_err(|e| self.connection_error(e))?;
        stream
            .login(self.config.user.as_str(), self.config.password.as_str())
            .map_err(|e| self.connection_error(format!("login: {e}")))
            .and_then(|()| {
                stream
                    .transfer_type(FileType::Binary)
                    .map_err(|e| self.connection_error(format!("binary mode: {e}")))
            })
            .map_err(|e| {
                let _ = stream.quit();
                e
            })?;

        Ok(Box::new(FtpSession {
            stream: Some(stream),
            directory: String::new(),
        }))
    }
}

pub struct FtpSession {
    stream: Option<FtpStream>,
    directory: String,
}

impl FtpSession {
    fn stream(&mut self) -> Option<&mut FtpStream> {
        self.stream.as_mut()
    }
}

/// `NLST` may return paths; keep the last segment.
fn bare_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry).trim()
}

/// Create `dest`, let `fill` stream into it, then flush. Any failure removes
/// the partial file.
fn receive_into(
    dest: &Path,
    fill: impl FnOnce(&mut fs::File) -> Result<u64, String>,
) -> Result<u64, String> {
    let mut out =
        fs::File::create(dest).map_err(|e| format!("create {}: {e}", dest.display()))?;
    let result = fill(&mut out).and_then(|bytes| {
        out.flush()
            .map(|()| bytes)
            .map_err(|e| format!("write {}: {e}", dest.display()))
    });
    drop(out);
    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

impl RemoteSession for FtpSession {
    fn list(&mut self, directory: &str) -> Result<Vec<String>, RemoteError> {
        let list_err = |reason: String| RemoteError::List {
            directory: directory.to_string(),
            reason,
        };
        let stream = self
            .stream()
            .ok_or_else(|| list_err("session closed".into()))?;

        stream
            .cwd(directory)
            .map_err(|e| list_err(format!("CWD: {e}")))?;
        let entries = stream
            .nlst(None)
            .map_err(|e| list_err(format!("NLST: {e}")))?;

        self.directory = directory.to_string();
        Ok(entries
            .iter()
            .map(|e| bare_name(e))
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn download(&mut self, file: &str, dest: &Path) -> Result<u64, RemoteError> {
        let transfer_err = |reason: String| RemoteError::Transfer {
            file: file.to_string(),
            reason,
        };
        let stream = self
            .stream()
            .ok_or_else(|| transfer_err("session closed".into()))?;

        let bytes = receive_into(dest, |out| {
            stream
                .retr(file, |reader| {
                    io::copy(reader, &mut *out).map_err(FtpError::ConnectionError)
                })
                .map_err(|e| format!("RETR: {e}"))
        })
        .map_err(transfer_err)?;

        tracing::debug!(file, bytes, directory = %self.directory, "transferred");
        Ok(bytes)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.quit() {
                tracing::debug!("FTP QUIT failed: {e}");
            }
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        self.close();
    }
}
