//! Patient record types for breast-mass cytology diagnosis.
//!
//! Based on the Wisconsin Diagnostic Breast Cancer feature set: ten nucleus
//! measurements, each reported as mean, standard error and worst value.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::doctor::Username;

/// Number of features the classifier expects.
pub const FEATURE_COUNT: usize = 30;

/// Canonical feature order, shared with the classifier export.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "radius_mean",
    "texture_mean",
    "perimeter_mean",
    "area_mean",
    "smoothness_mean",
    "compactness_mean",
    "concavity_mean",
    "concave_points_mean",
    "symmetry_mean",
    "fractal_dimension_mean",
    "radius_se",
    "texture_se",
    "perimeter_se",
    "area_se",
    "smoothness_se",
    "compactness_se",
    "concavity_se",
    "concave_points_se",
    "symmetry_se",
    "fractal_dimension_se",
    "radius_worst",
    "texture_worst",
    "perimeter_worst",
    "area_worst",
    "smoothness_worst",
    "compactness_worst",
    "concavity_worst",
    "concave_points_worst",
    "symmetry_worst",
    "fractal_dimension_worst",
];

/// The 30 nucleus measurements, always complete and in canonical order.
///
/// Serialized as a JSON object keyed by feature name (canonical key order).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Build from values already in canonical order.
    ///
    /// # Errors
    /// Returns error if the length is not 30 or a value is not finite.
    pub fn from_slice(values: &[f64]) -> Result<Self, String> {
        if values.len() != FEATURE_COUNT {
            return Err(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                values.len()
            ));
        }
        let mut out = [0.0; FEATURE_COUNT];
        for (i, (slot, value)) in out.iter_mut().zip(values).enumerate() {
            if !value.is_finite() {
                return Err(format!("Feature {} is not a finite number", FEATURE_NAMES[i]));
            }
            *slot = *value;
        }
        Ok(Self(out))
    }

    /// Build from `(name, value)` pairs; the name set must match exactly.
    ///
    /// # Errors
    /// Returns error on missing, unknown or non-finite features.
    pub fn from_named<I, K>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut slots: [Option<f64>; FEATURE_COUNT] = [None; FEATURE_COUNT];
        for (name, value) in pairs {
            let name = name.as_ref();
            let idx = FEATURE_NAMES
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| format!("Unknown feature: {name}"))?;
            slots[idx] = Some(value);
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (i, slot) in slots.iter().enumerate() {
            values[i] = slot.ok_or_else(|| format!("Missing feature: {}", FEATURE_NAMES[i]))?;
        }
        Self::from_slice(&values)
    }

    /// Values in canonical order, as sent to the classifier.
    #[must_use]
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    /// `(name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    /// True when no measurement has been entered.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, f64>::deserialize(deserializer)?;
        Self::from_named(map).map_err(D::Error::custom)
    }
}

/// Classification outcome stored on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnosis {
    Benign,
    Malignant,
    Pending,
}

impl Diagnosis {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "Benign",
            Self::Malignant => "Malignant",
            Self::Pending => "Pending",
        }
    }

    /// Map a binary classifier label (0 = benign, 1 = malignant).
    #[must_use]
    pub fn from_label(label: u8) -> Self {
        if label == 0 {
            Self::Benign
        } else {
            Self::Malignant
        }
    }
}

impl std::str::FromStr for Diagnosis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Benign" => Ok(Self::Benign),
            "Malignant" => Ok(Self::Malignant),
            "Pending" => Ok(Self::Pending),
            other => Err(format!("Unknown diagnosis: {other}")),
        }
    }
}

impl std::fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Female" => Ok(Self::Female),
            "Male" => Ok(Self::Male),
            "Other" => Ok(Self::Other),
            other => Err(format!("Unknown gender: {other}")),
        }
    }
}

/// Two-way class distribution; index 0 is the benign probability.
///
/// Serialized as `[p_benign, p_malignant]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct ProbabilityPair {
    benign: f64,
    malignant: f64,
}

impl ProbabilityPair {
    /// # Errors
    /// Returns error if a probability is outside [0, 1] or the pair does not sum to 1.
    pub fn new(benign: f64, malignant: f64) -> Result<Self, String> {
        for (label, p) in [("benign", benign), ("malignant", malignant)] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(format!("{label} probability {p} out of range [0, 1]"));
            }
        }
        if ((benign + malignant) - 1.0).abs() > 1e-6 {
            return Err(format!(
                "Probabilities must sum to 1 (got {})",
                benign + malignant
            ));
        }
        Ok(Self { benign, malignant })
    }

    #[must_use]
    pub fn benign(&self) -> f64 {
        self.benign
    }

    #[must_use]
    pub fn malignant(&self) -> f64 {
        self.malignant
    }

    /// Confidence in the most likely class, as a percentage.
    #[must_use]
    pub fn confidence_percent(&self) -> f64 {
        self.benign.max(self.malignant) * 100.0
    }
}

impl TryFrom<[f64; 2]> for ProbabilityPair {
    type Error = String;

    fn try_from(pair: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(pair[0], pair[1])
    }
}

impl From<ProbabilityPair> for [f64; 2] {
    fn from(pair: ProbabilityPair) -> Self {
        [pair.benign, pair.malignant]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    Planned,
    Ongoing,
    Completed,
}

impl std::str::FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Planned" => Ok(Self::Planned),
            "Ongoing" => Ok(Self::Ongoing),
            "Completed" => Ok(Self::Completed),
            other => Err(format!("Unknown progress status: {other}")),
        }
    }
}

/// One treatment timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub note: String,
    pub status: ProgressStatus,
}

/// Clinical content of a patient record, without identity or ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub diagnosis: Diagnosis,

    /// Confidence in the diagnosis, 0 to 100
    pub confidence: f64,

    pub features: FeatureVector,
    pub probabilities: ProbabilityPair,
    pub treatment_plan: String,
    pub progress: Vec<ProgressEntry>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PatientRecord {
    /// Validate field ranges before the record is written.
    ///
    /// # Errors
    /// Returns validation errors as a vector of strings.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Patient name must not be empty".to_string());
        }
        if self.age > 120 {
            errors.push(format!("Age {} out of range [0, 120]", self.age));
        }
        if !self.confidence.is_finite() || !(0.0..=100.0).contains(&self.confidence) {
            errors.push(format!(
                "Confidence {} out of range [0, 100]",
                self.confidence
            ));
        }
        if self.progress.iter().any(|e| e.note.trim().is_empty()) {
            errors.push("Progress notes must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A stored patient: identity, owner and clinical record.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub patient_id: String,
    pub doctor_username: Username,
    pub record: PatientRecord,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const BENIGN_SAMPLE: [f64; FEATURE_COUNT] = [
        12.0, 14.0, 78.0, 450.0, 0.09, 0.08, 0.02, 0.02, 0.18, 0.06, 0.3, 0.9, 2.0, 24.0, 0.007,
        0.02, 0.02, 0.01, 0.02, 0.003, 13.0, 16.0, 85.0, 520.0, 0.11, 0.13, 0.04, 0.04, 0.22,
        0.07,
    ];

    pub(crate) fn sample_record(name: &str) -> PatientRecord {
        PatientRecord {
            name: name.to_string(),
            age: 52,
            gender: Gender::Female,
            diagnosis: Diagnosis::Benign,
            confidence: 91.5,
            features: FeatureVector::from_slice(&BENIGN_SAMPLE).expect("Valid sample"),
            probabilities: ProbabilityPair::new(0.915, 0.085).expect("Valid pair"),
            treatment_plan: String::new(),
            progress: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_feature_names_are_unique() {
        let mut names = FEATURE_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(FeatureVector::from_slice(&BENIGN_SAMPLE).is_ok());
        assert!(FeatureVector::from_slice(&BENIGN_SAMPLE[..29]).is_err());

        let mut bad = BENIGN_SAMPLE;
        bad[3] = f64::NAN;
        assert!(FeatureVector::from_slice(&bad).is_err());
    }

    #[test]
    fn test_json_keeps_canonical_order() {
        let features = FeatureVector::from_slice(&BENIGN_SAMPLE).expect("Valid");
        let json = serde_json::to_string(&features).expect("Should serialize");

        let first = json.find("\"radius_mean\"").expect("Has radius_mean");
        let middle = json.find("\"radius_se\"").expect("Has radius_se");
        let last = json.find("\"fractal_dimension_worst\"").expect("Has last");
        assert!(first < middle && middle < last);

        let back: FeatureVector = serde_json::from_str(&json).expect("Should parse");
        assert_eq!(back, features);
        assert_eq!(back.get("area_mean"), Some(450.0));
    }

    #[test]
    fn test_json_rejects_wrong_name_set() {
        let features = FeatureVector::from_slice(&BENIGN_SAMPLE).expect("Valid");
        let mut value = serde_json::to_value(features).expect("Should serialize");
        let map = value.as_object_mut().expect("Object");

        map.remove("symmetry_se");
        assert!(serde_json::from_value::<FeatureVector>(value.clone()).is_err());

        let map = value.as_object_mut().expect("Object");
        map.insert("symmetry_se".into(), serde_json::json!(0.02));
        map.insert("bogus".into(), serde_json::json!(1.0));
        assert!(serde_json::from_value::<FeatureVector>(value).is_err());
    }

    #[test]
    fn test_probability_pair() {
        let pair = ProbabilityPair::new(0.2, 0.8).expect("Valid");
        assert!((pair.confidence_percent() - 80.0).abs() < 1e-9);
        assert_eq!(serde_json::to_string(&pair).expect("json"), "[0.2,0.8]");

        assert!(ProbabilityPair::new(1.2, -0.2).is_err());
        assert!(ProbabilityPair::new(0.5, 0.6).is_err());
        assert!(serde_json::from_str::<ProbabilityPair>("[0.7,0.7]").is_err());
    }

    #[test]
    fn test_record_validation() {
        assert!(sample_record("Jane Roe").validate().is_ok());

        let mut bad = sample_record(" ");
        bad.confidence = 140.0;
        bad.age = 300;
        assert_eq!(bad.validate().expect_err("Should fail").len(), 3);
    }

    #[test]
    fn test_diagnosis_label_mapping() {
        assert_eq!(Diagnosis::from_label(0), Diagnosis::Benign);
        assert_eq!(Diagnosis::from_label(1), Diagnosis::Malignant);
        assert_eq!("Pending".parse::<Diagnosis>(), Ok(Diagnosis::Pending));
    }
}
