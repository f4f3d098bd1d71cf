//! Practice statistics over one doctor's patients.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Diagnosis, Patient, Username, FEATURE_COUNT, FEATURE_NAMES};
use crate::ports::Storage;
use crate::OncodeskError;

use super::directory::DoctorDirectory;
use super::records::PatientStore;

/// Number of features reported in `top_feature_means`.
const TOP_FEATURES: usize = 10;

/// Aggregate view of a doctor's caseload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeStatistics {
    pub total_patients: usize,
    pub benign: usize,
    pub malignant: usize,
    pub pending: usize,
    pub benign_percent: f64,
    pub malignant_percent: f64,
    pub cases_by_day: BTreeMap<chrono::NaiveDate, usize>,

    /// Largest feature means across the caseload, descending
    pub top_feature_means: Vec<(String, f64)>,

    /// Doctors registered in the directory
    pub doctor_count: usize,
}

impl PracticeStatistics {
    /// Aggregate a list of patients.
    #[must_use]
    pub fn from_patients(patients: &[Patient], doctor_count: usize) -> Self {
        let total = patients.len();
        let count = |d: Diagnosis| patients.iter().filter(|p| p.record.diagnosis == d).count();
        let benign = count(Diagnosis::Benign);
        let malignant = count(Diagnosis::Malignant);
        let percent = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 * 100.0 / total as f64
            }
        };

        let mut cases_by_day = BTreeMap::new();
        for patient in patients {
            *cases_by_day
                .entry(patient.record.created_at.date_naive())
                .or_insert(0) += 1;
        }

        let mut sums = [0.0; FEATURE_COUNT];
        for patient in patients {
            for (sum, value) in sums.iter_mut().zip(patient.record.features.values()) {
                *sum += value;
            }
        }
        let mut means: Vec<(String, f64)> = if total == 0 {
            Vec::new()
        } else {
            FEATURE_NAMES
                .iter()
                .zip(sums)
                .map(|(name, sum)| (name.to_string(), sum / total as f64))
                .collect()
        };
        // Stable sort keeps canonical order among equal means.
        means.sort_by(|a, b| b.1.total_cmp(&a.1));
        means.truncate(TOP_FEATURES);

        Self {
            total_patients: total,
            benign,
            malignant,
            pending: count(Diagnosis::Pending),
            benign_percent: percent(benign),
            malignant_percent: percent(malignant),
            cases_by_day,
            top_feature_means: means,
            doctor_count,
        }
    }
}

/// Service computing [`PracticeStatistics`] from storage.
pub struct StatisticsService<S>
where
    S: Storage,
{
    patients: PatientStore<S>,
    directory: DoctorDirectory<S>,
}

impl<S> StatisticsService<S>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            patients: PatientStore::new(Arc::clone(&storage)),
            directory: DoctorDirectory::new(storage),
        }
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn for_doctor(&self, doctor: &Username) -> Result<PracticeStatistics, OncodeskError> {
        let patients = self.patients.list_by_doctor(doctor)?;
        let doctor_count = self.directory.count()?;
        Ok(PracticeStatistics::from_patients(&patients, doctor_count))
    }
}
