//! Notifier port: outbound email boundary.
//!
//! The core only builds `(to, subject, html_body)` triples. Delivery is
//! best-effort and must never undo state that was already committed.

/// A fully rendered email.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Errors reported by a mail transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("Mail delivery is not configured")]
    NotConfigured,

    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// Trait for delivering email.
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    /// Returns error if the message could not be handed to the transport.
    fn send(&self, email: &Email) -> Result<(), NotifyError>;
}
