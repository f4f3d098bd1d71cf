//! Mail adapters: Implementations of Notifier.
//!
//! - [`OutboxNotifier`] drops each message as a JSON file into a spool
//!   directory for a relay to pick up.
//! - [`DisabledNotifier`] is used when no outbox is configured; every send
//!   reports [`NotifyError::NotConfigured`] and the caller carries on.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ports::{Email, Notifier, NotifyError};

/// Notifier used when mail delivery is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        tracing::warn!(
            "Mail delivery not configured; skipped \"{}\"",
            email.subject
        );
        Err(NotifyError::NotConfigured)
    }
}

/// On-disk shape of a spooled message.
#[derive(Serialize)]
struct OutboxEntry<'a> {
    queued_at: String,
    #[serde(flatten)]
    email: &'a Email,
}

/// Spool-directory notifier.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    /// Create the notifier, creating `dir` if it does not exist.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message_name() -> String {
        format!(
            "{}-{:016x}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f"),
            rand::random::<u64>()
        )
    }

    /// Write `body` under a temporary name, then rename it to `{name}.json`
    /// so a relay never observes a partial file.
    fn spool(&self, name: &str, body: &[u8]) -> Result<(), NotifyError> {
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let path = self.dir.join(format!("{name}.json"));
        std::fs::write(&tmp, body).map_err(|e| NotifyError::Transport(e.to_string()))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(NotifyError::Transport(e.to_string()));
        }
        Ok(())
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let entry = OutboxEntry {
            queued_at: chrono::Utc::now().to_rfc3339(),
            email,
        };
        let body = serde_json::to_vec_pretty(&entry)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        self.spool(&Self::message_name(), &body)?;

        tracing::info!("Queued \"{}\" in outbox", email.subject);
        Ok(())
    }
}
