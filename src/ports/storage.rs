//! Storage port: Trait for persistent storage operations.
//!
//! This trait abstracts the storage backend (SQLite) from the application logic.
//!
//! Every method is a single statement against the store. Sequences built on
//! top of it (check-then-insert, read-modify-write) are not atomic as a whole.

use crate::domain::{ApplicationId, Doctor, PatientRecord, Patient, PendingApplication, Username};

/// Trait for the relational store behind doctors, applications and patients.
pub trait Storage: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a doctor by normalized username.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_doctor(&self, username: &Username) -> Result<Option<Doctor>, Self::Error>;

    /// Insert or replace a doctor keyed by username.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), Self::Error>;

    /// Count registered doctors.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count_doctors(&self) -> Result<usize, Self::Error>;

    /// Insert or replace a pending application keyed by its id.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_application(&self, application: &PendingApplication) -> Result<(), Self::Error>;

    /// Load a pending application.
    ///
    /// # Returns
    /// `None` if the id never existed or was already consumed.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PendingApplication>, Self::Error>;

    /// Load all pending applications, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn list_applications(&self) -> Result<Vec<PendingApplication>, Self::Error>;

    /// Delete a pending application.
    ///
    /// # Returns
    /// `true` if a row was removed.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_application(&self, id: &ApplicationId) -> Result<bool, Self::Error>;

    /// Insert or replace a patient keyed by `patient_id` alone.
    ///
    /// An existing row owned by another doctor is reassigned to `doctor`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn upsert_patient(
        &self,
        doctor: &Username,
        patient_id: &str,
        record: &PatientRecord,
    ) -> Result<(), Self::Error>;

    /// Load one patient if it is currently owned by `doctor`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_patient(&self, doctor: &Username, patient_id: &str)
        -> Result<Option<Patient>, Self::Error>;

    /// Load every patient currently owned by `doctor`, oldest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn list_patients(&self, doctor: &Username) -> Result<Vec<Patient>, Self::Error>;

    /// Delete a patient if it is currently owned by `doctor`.
    ///
    /// # Returns
    /// `true` if a row was removed.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_patient(&self, doctor: &Username, patient_id: &str) -> Result<bool, Self::Error>;
}
