//! Model adapter: Implementation of Classifier.
//!
//! Loads a standardized logistic-regression model exported as JSON by the
//! training pipeline:
//!
//! ```json
//! {
//!   "feature_names": ["radius_mean", ...],
//!   "scaler_mean": [...],
//!   "scaler_scale": [...],
//!   "coefficients": [...],
//!   "intercept": -0.35
//! }
//! ```
//!
//! Inference is `sigmoid(intercept + Σ coef_i * (x_i - mean_i) / scale_i)`,
//! giving the malignant-class probability.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{FeatureVector, ProbabilityPair, FEATURE_COUNT, FEATURE_NAMES};
use crate::ports::{Classification, Classifier, ClassifierError};

/// Probability at or above which the label is malignant.
const DECISION_THRESHOLD: f64 = 0.5;

/// Model parameters as exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedModel {
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Logistic-regression classifier over the canonical feature vector.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn to_array(name: &str, values: &[f64]) -> Result<[f64; FEATURE_COUNT], ClassifierError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::InvalidModel(format!(
            "{name} contains non-finite values"
        )));
    }
    values.try_into().map_err(|_| {
        ClassifierError::InvalidModel(format!(
            "{name} has {} entries, expected {FEATURE_COUNT}",
            values.len()
        ))
    })
}

impl LogisticModel {
    /// Load and validate a model export from disk.
    ///
    /// # Errors
    /// Returns `ModelNotLoaded` if the file cannot be read and `InvalidModel`
    /// if its contents do not describe a model over the canonical features.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ClassifierError::ModelNotLoaded(format!("{}: {e}", path.display())))?;
        let export: ExportedModel = serde_json::from_slice(&bytes)
            .map_err(|e| ClassifierError::InvalidModel(e.to_string()))?;
        let model = Self::from_export(export)?;

        tracing::info!(
            "Loaded classifier from {:?} (sha256={})",
            path,
            &sha256_hex(&bytes)[..16]
        );
        Ok(model)
    }

    /// Validate an in-memory export.
    ///
    /// # Errors
    /// Returns `InvalidModel` on a feature-order mismatch, wrong lengths,
    /// non-finite parameters or a zero scale.
    pub fn from_export(export: ExportedModel) -> Result<Self, ClassifierError> {
        if export.feature_names.len() != FEATURE_COUNT
            || export
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(got, want)| got != want)
        {
            return Err(ClassifierError::InvalidModel(
                "feature_names do not match the canonical feature order".into(),
            ));
        }

        let mean = to_array("scaler_mean", &export.scaler_mean)?;
        let scale = to_array("scaler_scale", &export.scaler_scale)?;
        let coefficients = to_array("coefficients", &export.coefficients)?;
        if !export.intercept.is_finite() {
            return Err(ClassifierError::InvalidModel("intercept is not finite".into()));
        }
        if scale.iter().any(|s| *s == 0.0) {
            return Err(ClassifierError::InvalidModel("scaler_scale contains zero".into()));
        }

        Ok(Self {
            mean,
            scale,
            coefficients,
            intercept: export.intercept,
        })
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }
}

impl Classifier for LogisticModel {
    fn classify(&self, features: &FeatureVector) -> Result<Classification, ClassifierError> {
        let logit = features
            .values()
            .iter()
            .enumerate()
            .fold(self.intercept, |acc, (i, x)| {
                acc + self.coefficients[i] * (x - self.mean[i]) / self.scale[i]
            });

        let malignant = Self::sigmoid(logit);
        if !malignant.is_finite() {
            return Err(ClassifierError::Prediction(
                "model produced a non-finite probability".into(),
            ));
        }

        let probabilities =
            ProbabilityPair::new(1.0 - malignant, malignant).map_err(ClassifierError::Prediction)?;
        let label = u8::from(malignant >= DECISION_THRESHOLD);

        Ok(Classification {
            label,
            probabilities,
        })
    }
}
