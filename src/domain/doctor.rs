//! Practitioner accounts and signup validation.
//!
//! # Security
//!
//! - Passwords are only ever held as one-way digests (`PasswordDigest`)
//! - New digests use Argon2id with a random salt per digest
//! - Legacy SHA-256 hex digests still verify, compared in constant time
//! - `Debug` implementations never expose digests or plaintext

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Placeholder shown by signup forms before a specialization is picked.
pub const SPECIALIZATION_PLACEHOLDER: &str = "Select Specialization";

/// Upper bound on declared years of experience.
pub const MAX_EXPERIENCE_YEARS: u32 = 50;

/// Error raised while deriving a password digest.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password digest derivation failed: {0}")]
    Derivation(String),
}

/// Case-normalized practitioner username.
///
/// Construction trims surrounding whitespace and lower-cases, so every
/// comparison and lookup sees the same spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Username(String);

impl Username {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the characters allowed for newly requested usernames.
    ///
    /// Restricting to `[a-z0-9._-]` keeps application ids URL-safe.
    ///
    /// # Errors
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.0.chars().count();
        if !(3..=64).contains(&len) {
            return Err("Please enter a username (3 to 64 characters)".to_string());
        }
        if !self
            .0
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        {
            return Err(
                "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
            );
        }
        Ok(())
    }
}

impl From<String> for Username {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for Username {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Argon2id digest that matches no password, with the same cost as
/// [`PasswordDigest::derive`]. Checked for unknown usernames so that a failed
/// sign-in takes as long whether or not the account exists.
const UNKNOWN_ACCOUNT_DIGEST: &str =
    "$argon2id$v=19$m=47104,t=1,p=1$x0QtmpCDW+ffM2S9UFl4uA$5RaLQhTcu9H6iJQ+bo5BfkKqZcum+R5Jst+ouEQhBjc";

/// One-way password digest as stored in the directory.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Derive an Argon2id digest (PHC string format) from a plaintext password.
    ///
    /// # Errors
    /// Returns error if the Argon2 parameters or hashing fail.
    pub fn derive(plaintext: &str) -> Result<Self, PasswordError> {
        let params = Params::new(47104, 1, 1, Some(32))
            .map_err(|e| PasswordError::Derivation(format!("Invalid Argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);

        let hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Derivation(e.to_string()))?;

        Ok(Self(hash.to_string()))
    }

    /// Legacy unsalted SHA-256 hex digest.
    ///
    /// Only used for the pre-hashed demonstration accounts and for
    /// databases written by earlier releases.
    #[must_use]
    pub fn legacy_sha256(plaintext: &str) -> Self {
        Self(sha256_hex(plaintext.as_bytes()))
    }

    /// Stand-in digest for usernames with no account.
    #[must_use]
    pub fn unknown_account() -> Self {
        Self(UNKNOWN_ACCOUNT_DIGEST.to_string())
    }

    /// Wrap a digest loaded from storage.
    #[must_use]
    pub fn from_stored(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check a plaintext password against this digest.
    ///
    /// Unknown digest formats never verify.
    #[must_use]
    pub fn verify(&self, plaintext: &str) -> bool {
        if self.0.starts_with("$argon2") {
            return match PasswordHash::new(&self.0) {
                Ok(parsed) => Argon2::default()
                    .verify_password(plaintext.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            };
        }

        if self.0.len() == 64 && self.0.bytes().all(|b| b.is_ascii_hexdigit()) {
            let candidate = sha256_hex(plaintext.as_bytes());
            return candidate
                .as_bytes()
                .ct_eq(self.0.to_ascii_lowercase().as_bytes())
                .into();
        }

        false
    }
}

// Digests are not secret-equivalent, but they are still offline-crackable.
impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.0.starts_with("$argon2") {
            "argon2"
        } else {
            "legacy-sha256"
        };
        f.debug_struct("PasswordDigest")
            .field("scheme", &scheme)
            .finish_non_exhaustive()
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A practitioner allowed to log in.
#[derive(Debug, Clone)]
pub struct Doctor {
    pub username: Username,
    pub name: String,
    pub email: Option<String>,
    pub specialization: Option<String>,
    pub password_hash: PasswordDigest,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Doctor {
    #[must_use]
    pub fn verify_password(&self, plaintext: &str) -> bool {
        self.password_hash.verify(plaintext)
    }
}

/// Registration request as submitted by a candidate practitioner.
#[derive(Clone, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience: u32,
    pub license: String,
    pub hospital: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

impl SignupForm {
    /// Requested username after normalization.
    #[must_use]
    pub fn username(&self) -> Username {
        Username::new(&self.username)
    }

    /// Validate every field, collecting all problems at once.
    ///
    /// # Errors
    /// Returns the list of validation messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().chars().count() < 3 {
            errors.push("Please enter a valid full name".to_string());
        }
        if !self.email.contains('@') {
            errors.push("Please enter a valid email address".to_string());
        }
        let specialization = self.specialization.trim();
        if specialization.is_empty() || specialization == SPECIALIZATION_PLACEHOLDER {
            errors.push("Please select your medical specialization".to_string());
        }
        if self.license.trim().chars().count() < 3 {
            errors.push("Please enter your medical license number".to_string());
        }
        if self.hospital.trim().chars().count() < 3 {
            errors.push("Please enter your hospital/clinic name".to_string());
        }
        if let Err(e) = self.username().validate() {
            errors.push(e);
        }
        if self.password.chars().count() < 6 {
            errors.push("Please enter a password (minimum 6 characters)".to_string());
        }
        if self.password != self.confirm_password {
            errors.push("Passwords do not match".to_string());
        }
        if self.phone.trim().chars().count() < 10 {
            errors.push("Please enter a valid phone number".to_string());
        }
        if self.experience > MAX_EXPERIENCE_YEARS {
            errors.push(format!(
                "Years of experience must be between 0 and {MAX_EXPERIENCE_YEARS}"
            ));
        }
        let single_line = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("specialization", &self.specialization),
            ("license", &self.license),
            ("hospital", &self.hospital),
        ];
        for (field, value) in single_line {
            if value.chars().any(char::is_control) {
                errors.push(format!("The {field} field must not contain control characters"));
            }
        }
        if !self.terms_accepted {
            errors.push("Please agree to the terms and conditions".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("specialization", &self.specialization)
            .finish_non_exhaustive()
    }
}
