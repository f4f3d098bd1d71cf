//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the admission workflow and the patient record use cases.

mod diagnosis;
mod directory;
pub mod notices;
mod records;
mod registry;
mod statistics;

pub use diagnosis::{DiagnosisRequest, DiagnosisService};
pub use directory::DoctorDirectory;
pub use records::PatientStore;
pub use registry::{
    ActionLinks, ApplicationRegistry, Delivery, LinkOutcome, Submission, TransitionOutcome,
};
pub use statistics::{PracticeStatistics, StatisticsService};
