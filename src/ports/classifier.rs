//! Classifier port: the pre-trained diagnosis model.
//!
//! The model itself is opaque; the core supplies a canonical 30-element
//! feature vector and consumes a binary label plus a class distribution.

use crate::domain::{Diagnosis, FeatureVector, ProbabilityPair};

/// Errors raised by a classifier implementation.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// Output of one classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Binary label (0 = benign, 1 = malignant)
    pub label: u8,

    /// Class distribution, index 0 benign
    pub probabilities: ProbabilityPair,
}

impl Classification {
    #[must_use]
    pub fn diagnosis(&self) -> Diagnosis {
        Diagnosis::from_label(self.label)
    }
}

/// Trait for diagnosis models.
pub trait Classifier: Send + Sync {
    /// Classify one feature vector.
    ///
    /// # Errors
    /// Returns error if the model is unavailable or produces invalid output.
    fn classify(&self, features: &FeatureVector) -> Result<Classification, ClassifierError>;
}
