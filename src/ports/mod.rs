//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (store, mail, model).

mod classifier;
mod notifier;
mod storage;

pub use classifier::{Classification, Classifier, ClassifierError};
pub use notifier::{Email, Notifier, NotifyError};
pub use storage::Storage;
