//! Domain layer: Core business types and logic.
//!
//! This module has no I/O. Types enforce their shape invariants at
//! construction (normalized usernames, complete feature vectors,
//! bounded probabilities).

pub mod application;
pub mod doctor;
pub mod link;
pub mod patient;
pub mod token;

pub use application::{Action, ApplicationId, Decision, Outcome, PendingApplication};
pub use doctor::{Doctor, PasswordDigest, PasswordError, SignupForm, Username};
pub use link::LinkRequest;
pub use patient::{
    Diagnosis, FeatureVector, Gender, Patient, PatientRecord, ProbabilityPair, ProgressEntry,
    ProgressStatus, FEATURE_COUNT, FEATURE_NAMES,
};
pub use token::{SigningSecret, TokenAuthority};
