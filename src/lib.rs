//! # Oncodesk
//!
//! Practitioner admission and per-doctor patient records for a breast-cancer
//! diagnosis desk.
//!
//! This crate provides:
//! - Signup with administrator approval through single-use HMAC links
//! - Password authentication for admitted doctors
//! - Classifier-backed diagnosis records owned by one doctor each
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (Doctor, PendingApplication, Patient, tokens)
//! - `ports`: Trait definitions for storage, mail and the classifier
//! - `adapters`: Concrete implementations (SQLite, outbox mail, JSON model)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment-driven settings and secret loading

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{Action, ApplicationId, Doctor, Patient, PatientRecord, Username};

/// Result type for Oncodesk operations
pub type Result<T> = std::result::Result<T, OncodeskError>;

/// Main error type for Oncodesk
#[derive(Debug, thiserror::Error)]
pub enum OncodeskError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("Invalid or tampered link token")]
    InvalidToken,

    #[error("Invalid username or password")]
    AuthenticationFailed,

    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ports::ClassifierError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Password hashing failed: {0}")]
    Password(#[from] domain::PasswordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
