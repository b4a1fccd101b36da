//! Remote source traits, listing filter and session guard.
//!
//! The orchestrator never talks to a transfer client directly. A
//! [`RemoteSource`] opens a [`RemoteSession`]; the session lists a directory
//! and downloads files to local paths. Sessions are wrapped in a
//! [`SessionGuard`] so they are closed on every exit path.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use thiserror::Error;

/// Errors from the remote side. All of them abort a run before conversion.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("cannot list '{directory}': {reason}")]
    List { directory: String, reason: String },

    #[error("transfer of '{file}' failed: {reason}")]
    Transfer { file: String, reason: String },
}

/// Something we can connect to.
pub trait RemoteSource {
    /// Human-readable name, e.g. the host.
    fn name(&self) -> &str;

    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An open connection.
pub trait RemoteSession {
    /// Filenames in `directory`, in the order the server returns them.
    fn list(&mut self, directory: &str) -> Result<Vec<String>, RemoteError>;

    /// Download `file` (relative to the last listed directory) into `dest`.
    /// Returns the number of bytes written.
    fn download(&mut self, file: &str, dest: &Path) -> Result<u64, RemoteError>;

    /// Release the connection. Must be safe to call more than once.
    fn close(&mut self);
}

/// Closes the wrapped session when dropped.
pub struct SessionGuard {
    session: Box<dyn RemoteSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn RemoteSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn RemoteSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Filenames that start with `prefix` and end with `suffix`, listing order kept.
pub fn select_matching(listing: &[String], prefix: &str, suffix: &str) -> Vec<String> {
    listing
        .iter()
        .filter(|name| name.starts_with(prefix) && name.ends_with(suffix))
        .cloned()
        .collect()
}
