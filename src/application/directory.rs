//! Doctor directory: account lookup, password verification and seeding.

use std::sync::Arc;

use crate::domain::{Doctor, PasswordDigest, Username};
use crate::ports::Storage;
use crate::OncodeskError;

/// Demonstration accounts installed into an empty directory.
///
/// `(username, display name, specialization, sha256 hex of the password)`
const SEED_ACCOUNTS: [(&str, &str, &str, &str); 3] = [
    (
        "dr.smith",
        "Dr. John Smith",
        "Oncology",
        "845271951f36aea7a4f5e58859177e0c9d4f501431c25945eac7da26b0be19b6",
    ),
    (
        "dr.jones",
        "Dr. Sarah Jones",
        "Radiology",
        "969310d9fa7d16db3f4e802e073bb4d1880d19e6272f021123b4ba72514b6960",
    ),
    (
        "dr.wilson",
        "Dr. Michael Wilson",
        "Pathology",
        "053d617c3b3f88b5b2e8f5bcc8252f548f0f45498d13c889126efbf02733a93d",
    ),
];

/// Account store for admitted practitioners.
pub struct DoctorDirectory<S>
where
    S: Storage,
{
    storage: Arc<S>,
}

impl<S: Storage> Clone for DoctorDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S> DoctorDirectory<S>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    /// Returns `AuthenticationFailed` for an unknown username or a wrong
    /// password alike.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Doctor, OncodeskError> {
        let username = Username::new(username);
        let doctor = self.get(&username)?;
        let verified = match &doctor {
            Some(doctor) => doctor.verify_password(password),
            None => {
                let _ = PasswordDigest::unknown_account().verify(password);
                false
            }
        };

        match doctor {
            Some(doctor) if verified => {
                tracing::info!("Doctor {} signed in", doctor.username);
                Ok(doctor)
            }
            _ => {
                tracing::warn!("Failed sign-in attempt for {}", username);
                Err(OncodeskError::AuthenticationFailed)
            }
        }
    }

    /// Insert or replace an account keyed by username.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn upsert(&self, doctor: &Doctor) -> Result<(), OncodeskError> {
        self.storage
            .upsert_doctor(doctor)
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// Install the demonstration accounts if the directory is empty.
    ///
    /// # Returns
    /// Number of accounts created (0 when the directory already had accounts).
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn seed(&self) -> Result<usize, OncodeskError> {
        if self.count()? > 0 {
            tracing::debug!("Directory already populated; skipping seed");
            return Ok(0);
        }

        let now = chrono::Utc::now();
        for (username, name, specialization, digest) in SEED_ACCOUNTS {
            self.upsert(&Doctor {
                username: Username::new(username),
                name: name.to_string(),
                email: None,
                specialization: Some(specialization.to_string()),
                password_hash: PasswordDigest::from_stored(digest),
                created_at: now,
            })?;
        }

        tracing::info!("Seeded {} demonstration accounts", SEED_ACCOUNTS.len());
        Ok(SEED_ACCOUNTS.len())
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn get(&self, username: &Username) -> Result<Option<Doctor>, OncodeskError> {
        self.storage
            .get_doctor(username)
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn exists(&self, username: &Username) -> Result<bool, OncodeskError> {
        Ok(self.get(username)?.is_some())
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn count(&self) -> Result<usize, OncodeskError> {
        self.storage
            .count_doctors()
            .map_err(|e| OncodeskError::Storage(e.into()))
    }
}
