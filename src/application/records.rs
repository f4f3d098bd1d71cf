//! Patient store: per-doctor clinical records.
//!
//! Records are keyed by `patient_id` alone. Writing an id that another
//! doctor already uses moves the record to the writer; that doctor's list no
//! longer shows it.
//!
//! Treatment-plan edits and progress appends are read-modify-write over the
//! whole record. Two concurrent appends to the same patient can race, and the
//! later write drops the other's entry.

use std::sync::Arc;

use crate::domain::{Patient, PatientRecord, ProgressEntry, ProgressStatus, Username};
use crate::ports::Storage;
use crate::OncodeskError;

/// Service over the patient table, scoped per call to one doctor.
pub struct PatientStore<S>
where
    S: Storage,
{
    storage: Arc<S>,
}

impl<S: Storage> Clone for PatientStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S> PatientStore<S>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Insert or replace a record, assigning it to `doctor`.
    ///
    /// # Errors
    /// Returns `Validation` if the id is blank or the record is out of
    /// range (nothing is written), or a storage error.
    pub fn upsert(
        &self,
        doctor: &Username,
        patient_id: &str,
        record: &PatientRecord,
    ) -> Result<(), OncodeskError> {
        let mut errors = Vec::new();
        if patient_id.trim().is_empty() {
            errors.push("Patient ID must not be empty".to_string());
        }
        if let Err(mut record_errors) = record.validate() {
            errors.append(&mut record_errors);
        }
        if !errors.is_empty() {
            return Err(OncodeskError::Validation(errors));
        }

        self.storage
            .upsert_patient(doctor, patient_id.trim(), record)
            .map_err(|e| OncodeskError::Storage(e.into()))?;

        tracing::info!("Saved patient {} for {}", patient_id.trim(), doctor);
        Ok(())
    }

    /// Records currently owned by `doctor`, oldest first.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn list_by_doctor(&self, doctor: &Username) -> Result<Vec<Patient>, OncodeskError> {
        self.storage
            .list_patients(doctor)
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn get(&self, doctor: &Username, patient_id: &str) -> Result<Option<Patient>, OncodeskError> {
        self.storage
            .get_patient(doctor, patient_id)
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// Delete a record owned by `doctor`.
    ///
    /// # Returns
    /// `false` if the record does not exist or belongs to someone else.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn delete_patient(&self, doctor: &Username, patient_id: &str) -> Result<bool, OncodeskError> {
        let removed = self
            .storage
            .delete_patient(doctor, patient_id)
            .map_err(|e| OncodeskError::Storage(e.into()))?;
        if removed {
            tracing::info!("Deleted patient {} for {}", patient_id, doctor);
        }
        Ok(removed)
    }

    /// Append one entry to the patient's treatment timeline.
    ///
    /// # Errors
    /// Returns `PatientNotFound` if `doctor` does not own the record,
    /// `Validation` for an empty note, or a storage error.
    pub fn add_progress(
        &self,
        doctor: &Username,
        patient_id: &str,
        note: &str,
        status: ProgressStatus,
    ) -> Result<ProgressEntry, OncodeskError> {
        let mut patient = self.require(doctor, patient_id)?;

        let entry = ProgressEntry {
            timestamp: chrono::Utc::now(),
            note: note.trim().to_string(),
            status,
        };
        patient.record.progress.push(entry.clone());
        self.upsert(doctor, &patient.patient_id, &patient.record)?;

        Ok(entry)
    }

    /// Replace the patient's treatment plan.
    ///
    /// # Errors
    /// Returns `PatientNotFound` if `doctor` does not own the record, or a
    /// storage error.
    pub fn update_treatment_plan(
        &self,
        doctor: &Username,
        patient_id: &str,
        plan: &str,
    ) -> Result<(), OncodeskError> {
        let mut patient = self.require(doctor, patient_id)?;
        patient.record.treatment_plan = plan.to_string();
        self.upsert(doctor, &patient.patient_id, &patient.record)
    }

    fn require(&self, doctor: &Username, patient_id: &str) -> Result<Patient, OncodeskError> {
        self.get(doctor, patient_id)?
            .ok_or_else(|| OncodeskError::PatientNotFound(patient_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::{execute_raw, temp_storage};
    use crate::domain::patient::tests::sample_record;

    fn store() -> (tempfile::TempDir, PatientStore<crate::adapters::sqlite::SqliteStorage>) {
        let (dir, storage) = temp_storage();
        (dir, PatientStore::new(Arc::new(storage)))
    }

    #[test]
    fn test_upsert_and_list() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");

        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");
        store.upsert(&doc, "P2", &sample_record("Mary Major")).expect("Should save");
        store.upsert(&doc, "P1", &sample_record("Jane Q. Roe")).expect("Should replace");

        let patients = store.list_by_doctor(&doc).expect("Should list");
        assert_eq!(patients.len(), 2);
        let p1 = patients
            .iter()
            .find(|p| p.patient_id == "P1")
            .expect("P1 listed");
        assert_eq!(p1.record.name, "Jane Q. Roe");
    }

    #[test]
    fn test_collision_reassigns_ownership() {
        let (_dir, store) = store();
        let doc1 = Username::new("doc1");
        let doc2 = Username::new("doc2");

        store.upsert(&doc1, "P1", &sample_record("Jane Roe")).expect("Should save");
        store.upsert(&doc2, "P1", &sample_record("John Doe")).expect("Should save");

        assert!(store
            .list_by_doctor(&doc1)
            .expect("Should list")
            .iter()
            .all(|p| p.patient_id != "P1"));
        let owned = store.list_by_doctor(&doc2).expect("Should list");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].record.name, "John Doe");
    }

    #[test]
    fn test_delete_is_owner_scoped() {
        let (_dir, store) = store();
        let owner = Username::new("doc1");
        store.upsert(&owner, "P1", &sample_record("Jane Roe")).expect("Should save");

        assert!(!store
            .delete_patient(&Username::new("doc2"), "P1")
            .expect("Should run"));
        assert_eq!(store.list_by_doctor(&owner).expect("Should list").len(), 1);

        assert!(store.delete_patient(&owner, "P1").expect("Should delete"));
        assert!(store.list_by_doctor(&owner).expect("Should list").is_empty());
    }

    #[test]
    fn test_progress_appends_in_order() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");
        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");

        store
            .add_progress(&doc, "P1", "Biopsy scheduled", ProgressStatus::Planned)
            .expect("Should append");
        store
            .add_progress(&doc, "P1", "Chemotherapy cycle 1", ProgressStatus::Ongoing)
            .expect("Should append");

        let patient = store
            .get(&doc, "P1")
            .expect("Should load")
            .expect("Should exist");
        let notes: Vec<_> = patient.record.progress.iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, ["Biopsy scheduled", "Chemotherapy cycle 1"]);
        assert_eq!(patient.record.progress[1].status, ProgressStatus::Ongoing);
        assert!(patient.record.progress[0].timestamp <= patient.record.progress[1].timestamp);
    }

    #[test]
    fn test_progress_rejects_blank_note() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");
        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");

        let result = store.add_progress(&doc, "P1", "   ", ProgressStatus::Planned);
        assert!(matches!(result, Err(OncodeskError::Validation(_))));
        let patient = store.get(&doc, "P1").expect("Should load").expect("Should exist");
        assert!(patient.record.progress.is_empty());
    }

    #[test]
    fn test_other_doctor_cannot_edit() {
        let (_dir, store) = store();
        store
            .upsert(&Username::new("doc1"), "P1", &sample_record("Jane Roe"))
            .expect("Should save");

        let other = Username::new("doc2");
        assert!(matches!(
            store.update_treatment_plan(&other, "P1", "Surgery"),
            Err(OncodeskError::PatientNotFound(_))
        ));
        assert!(matches!(
            store.add_progress(&other, "P1", "note", ProgressStatus::Planned),
            Err(OncodeskError::PatientNotFound(_))
        ));
    }

    #[test]
    fn test_update_treatment_plan() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");
        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");

        store
            .update_treatment_plan(&doc, "P1", "Lumpectomy followed by radiotherapy")
            .expect("Should update");
        let patient = store.get(&doc, "P1").expect("Should load").expect("Should exist");
        assert_eq!(patient.record.treatment_plan, "Lumpectomy followed by radiotherapy");
    }

    #[test]
    fn test_invalid_record_is_not_written() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");
        let mut record = sample_record("Jane Roe");
        record.confidence = 150.0;

        assert!(matches!(
            store.upsert(&doc, "P1", &record),
            Err(OncodeskError::Validation(_))
        ));
        assert!(matches!(
            store.upsert(&doc, "  ", &sample_record("Jane Roe")),
            Err(OncodeskError::Validation(_))
        ));
        assert!(store.list_by_doctor(&doc).expect("Should list").is_empty());
    }

    #[test]
    fn test_concurrent_progress_append_loses_one_entry() {
        let (_dir, store) = store();
        let doc = Username::new("doc1");
        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");

        // Second session reads before the first one writes back.
        let mut stale = store.get(&doc, "P1").expect("Should load").expect("Should exist");
        store
            .add_progress(&doc, "P1", "Biopsy scheduled", ProgressStatus::Planned)
            .expect("Should append");

        stale.record.progress.push(ProgressEntry {
            timestamp: chrono::Utc::now(),
            note: "Imaging reviewed".to_string(),
            status: ProgressStatus::Completed,
        });
        store.upsert(&doc, "P1", &stale.record).expect("Should write back");

        let patient = store.get(&doc, "P1").expect("Should load").expect("Should exist");
        let notes: Vec<_> = patient.record.progress.iter().map(|e| e.note.as_str()).collect();
        assert_eq!(notes, ["Imaging reviewed"]);
    }

    #[test]
    fn test_progress_keeps_legacy_created_at() {
        let (_dir, storage) = temp_storage();
        let storage = Arc::new(storage);
        let store = PatientStore::new(Arc::clone(&storage));
        let doc = Username::new("doc1");
        store.upsert(&doc, "P1", &sample_record("Jane Roe")).expect("Should save");
        execute_raw(&storage, "UPDATE patients SET created_at = '2024-01-01 12:00'");

        store
            .add_progress(&doc, "P1", "Biopsy scheduled", ProgressStatus::Planned)
            .expect("Should append");
        store
            .update_treatment_plan(&doc, "P1", "Lumpectomy")
            .expect("Should update");

        let patient = store.get(&doc, "P1").expect("Should load").expect("Should exist");
        assert_eq!(patient.record.created_at.to_rfc3339(), "2024-01-01T12:00:00+00:00");
    }
}
