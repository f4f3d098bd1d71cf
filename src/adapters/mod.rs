//! Adapters layer: Concrete implementations of ports.
//!
//! - `sqlite`: rusqlite-backed storage
//! - `mail`: outbox spool and disabled notifiers
//! - `model`: JSON-exported logistic classifier
//! - `sanitize`: PII filtering for logs

pub mod mail;
pub mod model;
pub mod sanitize;
pub mod sqlite;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;
