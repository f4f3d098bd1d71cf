//! Diagnosis service: classify a feature vector and record the result.

use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{FeatureVector, Gender, Patient, PatientRecord, Username};
use crate::ports::{Classifier, Storage};
use crate::OncodeskError;

use super::records::PatientStore;

/// Input for one diagnosis.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisRequest {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub features: FeatureVector,
}

impl DiagnosisRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.patient_id.trim().is_empty() {
            errors.push("Patient ID must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("Patient name must not be empty".to_string());
        }
        if self.features.is_all_zero() {
            errors.push("Enter at least one measurement before running a diagnosis".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Service for running the classifier and storing its outcome.
pub struct DiagnosisService<C, S>
where
    C: Classifier,
    S: Storage,
{
    classifier: Arc<C>,
    patients: PatientStore<S>,
}

impl<C, S> DiagnosisService<C, S>
where
    C: Classifier,
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    pub fn new(classifier: Arc<C>, patients: PatientStore<S>) -> Self {
        Self {
            classifier,
            patients,
        }
    }

    /// Classify the request's features and save the patient under `doctor`.
    ///
    /// # Errors
    /// Returns `Validation` before calling the classifier, a classifier
    /// error (nothing stored), or a storage error.
    pub fn diagnose(
        &self,
        doctor: &Username,
        request: &DiagnosisRequest,
    ) -> Result<Patient, OncodeskError> {
        request.validate().map_err(OncodeskError::Validation)?;

        let classification = self.classifier.classify(&request.features)?;
        let diagnosis = classification.diagnosis();

        let record = PatientRecord {
            name: request.name.trim().to_string(),
            age: request.age,
            gender: request.gender,
            diagnosis,
            confidence: classification.probabilities.confidence_percent(),
            features: request.features.clone(),
            probabilities: classification.probabilities,
            treatment_plan: String::new(),
            progress: Vec::new(),
            created_at: chrono::Utc::now(),
        };

        let patient_id = request.patient_id.trim();
        self.patients.upsert(doctor, patient_id, &record)?;
        tracing::info!("Diagnosed patient {} as {}", patient_id, diagnosis);

        Ok(Patient {
            patient_id: patient_id.to_string(),
            doctor_username: doctor.clone(),
            record,
        })
    }
}
