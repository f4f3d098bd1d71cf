//! Runtime configuration.
//!
//! Everything is read from the environment once at startup. The link-signing
//! secret has its own precedence chain:
//!
//! 1. `ONCODESK_SECRET_KEY_FILE` (path to a file holding the secret)
//! 2. `/run/secrets/oncodesk_secret_key` (container secret mount)
//! 3. `APP_SECRET_KEY`
//! 4. a fixed development value, only in debug builds outside production
//!
//! The secret is the UTF-8 text of the value with surrounding whitespace
//! trimmed, so the same value works from a file or the environment.

use std::path::{Path, PathBuf};

use crate::domain::SigningSecret;

const DEFAULT_DB_PATH: &str = "medical_app.db";
const DEFAULT_BASE_URL: &str = "http://localhost:8501";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";
const DEFAULT_MODEL_PATH: &str = "models/breast_cancer_model.json";

const SECRET_FILE_ENV: &str = "ONCODESK_SECRET_KEY_FILE";
const SECRET_ENV: &str = "APP_SECRET_KEY";
const DOCKER_SECRET_PATH: &str = "/run/secrets/oncodesk_secret_key";
const DEV_SECRET: &str = "dev-insecure-secret";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No link-signing secret configured (set ONCODESK_SECRET_KEY_FILE or APP_SECRET_KEY)")]
    MissingSecret,

    #[error("Link-signing secret at {0} is empty")]
    EmptySecret(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") || v.eq_ignore_ascii_case("prod") => {
                Self::Production
            }
            _ => Self::Development,
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,

    /// Base URL for action and login links, without trailing `/`
    pub base_url: String,

    pub admin_email: String,

    /// Spool directory for outgoing mail; `None` disables delivery
    pub outbox_dir: Option<PathBuf>,

    pub model_path: PathBuf,
    pub environment: Environment,
}

impl Settings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = non_empty("APP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            db_path: non_empty("ONCODESK_DB_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            admin_email: non_empty("ONCODESK_ADMIN_EMAIL")
                .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            outbox_dir: non_empty("ONCODESK_OUTBOX_DIR").map(PathBuf::from),
            model_path: non_empty("ONCODESK_MODEL_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH), PathBuf::from),
            environment: Environment::parse(lookup("ONCODESK_ENV")),
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Load the link-signing secret from the process environment.
    ///
    /// # Errors
    /// Returns `MissingSecret` when nothing is configured and the development
    /// fallback is not allowed, or an I/O error for an unreadable secret file.
    pub fn load_secret(&self) -> Result<SigningSecret, ConfigError> {
        load_secret_with(
            |key| std::env::var(key).ok(),
            Path::new(DOCKER_SECRET_PATH),
            self.allow_dev_secret(),
        )
    }

    fn allow_dev_secret(&self) -> bool {
        cfg!(debug_assertions) && !self.is_production()
    }
}

fn read_secret_file(path: &Path) -> Result<SigningSecret, ConfigError> {
    let raw = zeroize::Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
        ConfigError::Io {
            path: path.display().to_string(),
            source,
        }
    })?);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptySecret(path.display().to_string()));
    }
    Ok(SigningSecret::from_bytes(trimmed.as_bytes().to_vec()))
}

fn load_secret_with<F>(
    lookup: F,
    docker_path: &Path,
    allow_dev_secret: bool,
) -> Result<SigningSecret, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(SECRET_FILE_ENV).filter(|p| !p.trim().is_empty()) {
        let secret = read_secret_file(Path::new(path.trim()))?;
        tracing::info!("Loaded link-signing secret from file ({})", secret.fingerprint());
        return Ok(secret);
    }

    if docker_path.exists() {
        let secret = read_secret_file(docker_path)?;
        tracing::info!("Loaded link-signing secret from secret mount ({})", secret.fingerprint());
        return Ok(secret);
    }

    if let Some(value) = lookup(SECRET_ENV) {
        let value = zeroize::Zeroizing::new(value);
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(SigningSecret::from_bytes(trimmed.as_bytes().to_vec()));
        }
    }

    if allow_dev_secret {
        tracing::warn!("Using the development link-signing secret; links are forgeable");
        return Ok(SigningSecret::from_bytes(DEV_SECRET.as_bytes().to_vec()));
    }

    Err(ConfigError::MissingSecret)
}
