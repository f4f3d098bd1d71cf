//! Application registry: pending registrations and the accept/reject machine.
//!
//! An application is `Pending` from `create` until its first transition
//! carrying a valid token, which deletes it (`Consumed`). Deleting the row is
//! the only thing that makes a link single-use: a replayed link finds nothing
//! and is reported as `UnknownApplication`.
//!
//! The duplicate-username check in `create` and the store write that follows
//! are separate statements; two simultaneous signups can both pass the check.

use std::sync::Arc;

use crate::domain::link::action_url;
use crate::domain::{
    Action, ApplicationId, Decision, LinkRequest, Outcome, PasswordDigest, PendingApplication,
    SignupForm, TokenAuthority,
};
use crate::ports::{Email, Notifier, Storage};
use crate::OncodeskError;

use super::directory::DoctorDirectory;
use super::notices;

/// The two URLs an administrator can follow for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLinks {
    pub accept: String,
    pub reject: String,
}

/// Result of a best-effort notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed(String),
}

impl Delivery {
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Result of `transition`.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The id never existed or was already consumed. Nothing changed.
    UnknownApplication,
    Decided(Decision),
}

/// Result of a signup submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub application_id: ApplicationId,
    pub links: ActionLinks,

    /// Delivery of the administrator notice
    pub delivery: Delivery,
}

/// Result of following an inbound link.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// Parameters missing or malformed, or the application is unknown.
    Ignored,
    Decided {
        decision: Decision,

        /// Delivery of the applicant notice
        delivery: Delivery,
    },
}

/// Pending-registration store and transition logic.
pub struct ApplicationRegistry<S, N>
where
    S: Storage,
    N: Notifier + ?Sized,
{
    storage: Arc<S>,
    directory: DoctorDirectory<S>,
    tokens: TokenAuthority,
    notifier: Arc<N>,
    base_url: String,
    admin_email: String,
}

impl<S, N> ApplicationRegistry<S, N>
where
    S: Storage,
    S::Error: Into<crate::adapters::StorageError>,
    N: Notifier + ?Sized,
{
    pub fn new(
        storage: Arc<S>,
        tokens: TokenAuthority,
        notifier: Arc<N>,
        base_url: impl Into<String>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            directory: DoctorDirectory::new(Arc::clone(&storage)),
            storage,
            tokens,
            notifier,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_email: admin_email.into(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &DoctorDirectory<S> {
        &self.directory
    }

    /// Store a new application.
    ///
    /// `password_hash` must already be a one-way digest.
    ///
    /// # Errors
    /// Returns `DuplicateUsername` (storing nothing) if the username belongs
    /// to an existing doctor, or a storage error.
    pub fn create(
        &self,
        form: &SignupForm,
        password_hash: PasswordDigest,
        submitted_at: chrono::NaiveDateTime,
    ) -> Result<ApplicationId, OncodeskError> {
        let application = PendingApplication::from_form(form, password_hash, submitted_at);
        self.store(&application)?;
        Ok(application.application_id)
    }

    fn store(&self, application: &PendingApplication) -> Result<(), OncodeskError> {
        if self.directory.exists(&application.username)? {
            return Err(OncodeskError::DuplicateUsername(
                application.username.to_string(),
            ));
        }

        self.storage
            .save_application(application)
            .map_err(|e| OncodeskError::Storage(e.into()))?;

        tracing::info!("Stored pending application {}", application.application_id);
        Ok(())
    }

    /// # Errors
    /// Returns error if storage fails.
    pub fn get(&self, id: &ApplicationId) -> Result<Option<PendingApplication>, OncodeskError> {
        self.storage
            .get_application(id)
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// Every pending application, oldest first.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn pending(&self) -> Result<Vec<PendingApplication>, OncodeskError> {
        self.storage
            .list_applications()
            .map_err(|e| OncodeskError::Storage(e.into()))
    }

    /// Signed accept/reject URLs for an application.
    #[must_use]
    pub fn action_links(&self, id: &ApplicationId) -> ActionLinks {
        let link = |action: Action| {
            let token = self.tokens.sign(id, action);
            action_url(&self.base_url, id, action, &token)
        };
        ActionLinks {
            accept: link(Action::Accept),
            reject: link(Action::Reject),
        }
    }

    /// Apply an administrator decision.
    ///
    /// # Errors
    /// Returns `InvalidToken` (leaving the application untouched) when the
    /// token does not match, or a storage error.
    pub fn transition(
        &self,
        id: &ApplicationId,
        action: Action,
        token: &str,
    ) -> Result<TransitionOutcome, OncodeskError> {
        let Some(application) = self.get(id)? else {
            tracing::info!("Ignoring {} for unknown application {}", action, id);
            return Ok(TransitionOutcome::UnknownApplication);
        };

        if !self.tokens.verify(id, action, token) {
            tracing::warn!("Rejected {} link for {}: token mismatch", action, id);
            return Err(OncodeskError::InvalidToken);
        }

        let outcome = match action {
            Action::Accept => {
                self.directory
                    .upsert(&application.to_doctor(chrono::Utc::now()))?;
                Outcome::Approved
            }
            Action::Reject => Outcome::Rejected,
        };

        self.storage
            .delete_application(id)
            .map_err(|e| OncodeskError::Storage(e.into()))?;

        tracing::info!("Application {} {}", id, outcome);
        Ok(TransitionOutcome::Decided(Decision::new(&application, outcome)))
    }

    /// Validate a signup form, store it and notify the administrator.
    ///
    /// # Errors
    /// Returns `Validation` with every problem found, `DuplicateUsername`, or
    /// a storage/hashing error. Notification failure is not an error.
    pub fn submit(&self, form: &SignupForm) -> Result<Submission, OncodeskError> {
        form.validate().map_err(OncodeskError::Validation)?;

        let password_hash = PasswordDigest::derive(&form.password)?;
        let application =
            PendingApplication::from_form(form, password_hash, chrono::Local::now().naive_local());
        self.store(&application)?;

        let links = self.action_links(&application.application_id);
        let delivery = self.deliver(&notices::admin_notice(&self.admin_email, &application, &links));

        Ok(Submission {
            application_id: application.application_id,
            links,
            delivery,
        })
    }

    /// Handle an inbound link, given as a full URL or a bare query string.
    ///
    /// # Errors
    /// Returns `InvalidToken` for a well-formed link whose token does not
    /// match, or a storage error.
    pub fn handle_link(&self, link: &str) -> Result<LinkOutcome, OncodeskError> {
        let request = if link.contains('?') {
            LinkRequest::from_url(link)
        } else {
            LinkRequest::from_query(link)
        };
        let Some(request) = request else {
            tracing::debug!("Ignoring link with missing or malformed parameters");
            return Ok(LinkOutcome::Ignored);
        };

        match self.transition(&request.application_id, request.action, &request.token)? {
            TransitionOutcome::UnknownApplication => Ok(LinkOutcome::Ignored),
            TransitionOutcome::Decided(decision) => {
                let delivery = self.deliver(&notices::decision_notice(&decision, &self.base_url));
                Ok(LinkOutcome::Decided { decision, delivery })
            }
        }
    }

    fn deliver(&self, email: &Email) -> Delivery {
        match self.notifier.send(email) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                tracing::warn!("Notification \"{}\" not delivered: {}", email.subject, e);
                Delivery::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::temp_storage;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::domain::doctor::tests::valid_form;
    use crate::domain::{SigningSecret, Username};
    use crate::ports::NotifyError;
    use std::sync::Mutex;

    const SCENARIO_ID: &str = "APP_20240101_120000_dr.lee";
    const SCENARIO_ACCEPT_MAC: &str =
        "9f04cbc028de623f3444540dab221df4b8e4bc5ac975e50a3dda64399623c93f";

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Email>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<Email> {
            self.sent.lock().expect("Lock should not be poisoned").clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, email: &Email) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .expect("Lock should not be poisoned")
                .push(email.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _email: &Email) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("connection refused".to_string()))
        }
    }

    fn registry<N: Notifier>(
        notifier: Arc<N>,
    ) -> (tempfile::TempDir, ApplicationRegistry<SqliteStorage, N>) {
        let (dir, storage) = temp_storage();
        let tokens = TokenAuthority::new(SigningSecret::from_bytes(b"unit-test-secret".to_vec()));
        let registry = ApplicationRegistry::new(
            Arc::new(storage),
            tokens,
            notifier,
            "http://localhost:8501/",
            "admin@clinic.example",
        );
        (dir, registry)
    }

    fn noon() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("Valid date")
    }

    /// Stores the `dr.lee` application submitted at 2024-01-01 12:00:00.
    fn create_scenario<N: Notifier>(registry: &ApplicationRegistry<SqliteStorage, N>) -> ApplicationId {
        let form = valid_form("dr.lee", "hunter22");
        let hash = PasswordDigest::derive(&form.password).expect("Should hash");
        let id = registry.create(&form, hash, noon()).expect("Should create");
        assert_eq!(id.as_str(), SCENARIO_ID);
        id
    }

    fn token(registry: &ApplicationRegistry<SqliteStorage, impl Notifier>, id: &ApplicationId, action: Action) -> String {
        registry.tokens.sign(id, action)
    }

    #[test]
    fn test_scenario_accept_creates_doctor() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        let id = create_scenario(&registry);

        let mac = token(&registry, &id, Action::Accept);
        assert_eq!(mac, SCENARIO_ACCEPT_MAC);

        let outcome = registry
            .transition(&id, Action::Accept, &mac)
            .expect("Should transition");
        match outcome {
            TransitionOutcome::Decided(decision) => {
                assert_eq!(decision.outcome, Outcome::Approved);
                assert_eq!(decision.applicant_email, "grace.lee@hospital.example");
            }
            TransitionOutcome::UnknownApplication => panic!("Expected a decision"),
        }

        let doctor = registry
            .directory()
            .authenticate("dr.lee", "hunter22")
            .expect("Accepted doctor should sign in");
        assert_eq!(doctor.name, "Dr. Grace Lee");
        assert!(registry.get(&id).expect("Should load").is_none());
    }

    #[test]
    fn test_accept_replay_is_unknown_and_creates_nothing() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        let id = create_scenario(&registry);
        let mac = token(&registry, &id, Action::Accept);

        registry
            .transition(&id, Action::Accept, &mac)
            .expect("Should transition");
        let replay = registry
            .transition(&id, Action::Accept, &mac)
            .expect("Replay is not an error");

        assert!(matches!(replay, TransitionOutcome::UnknownApplication));
        assert_eq!(registry.directory().count().expect("Should count"), 1);
    }

    #[test]
    fn test_scenario_reject_removes_without_doctor() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_dir, registry) = registry(Arc::clone(&notifier));
        let id = create_scenario(&registry);
        let mac = token(&registry, &id, Action::Reject);

        let link = format!("http://localhost:8501/?app_id={id}&action=reject&token={mac}");
        let outcome = registry.handle_link(&link).expect("Should handle");

        match outcome {
            LinkOutcome::Decided { decision, delivery } => {
                assert_eq!(decision.outcome, Outcome::Rejected);
                assert_eq!(delivery, Delivery::Sent);
            }
            LinkOutcome::Ignored => panic!("Expected a decision"),
        }
        assert!(registry.get(&id).expect("Should load").is_none());
        assert!(!registry
            .directory()
            .exists(&Username::new("dr.lee"))
            .expect("Should check"));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "grace.lee@hospital.example");
        assert_eq!(sent[0].subject, "Application Status Update");
        assert!(sent[0].html_body.contains("Dr. Grace Lee"));
        assert!(sent[0].html_body.contains(SCENARIO_ID));
    }

    #[test]
    fn test_empty_token_changes_nothing() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        let id = create_scenario(&registry);

        let result = registry.transition(&id, Action::Accept, "");
        assert!(matches!(result, Err(OncodeskError::InvalidToken)));

        let link = format!("app_id={id}&action=accept&token=");
        assert!(matches!(
            registry.handle_link(&link).expect("Should handle"),
            LinkOutcome::Ignored
        ));

        assert!(registry.get(&id).expect("Should load").is_some());
        assert_eq!(registry.directory().count().expect("Should count"), 0);
    }

    #[test]
    fn test_token_for_other_action_is_invalid() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        let id = create_scenario(&registry);
        let reject_mac = token(&registry, &id, Action::Reject);

        let result = registry.transition(&id, Action::Accept, &reject_mac);
        assert!(matches!(result, Err(OncodeskError::InvalidToken)));
        assert!(registry.get(&id).expect("Should load").is_some());
        assert_eq!(registry.directory().count().expect("Should count"), 0);
    }

    #[test]
    fn test_unknown_application_link_is_ignored() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_dir, registry) = registry(Arc::clone(&notifier));
        let ghost = ApplicationId::new("APP_20240101_000000_ghost");
        let mac = token(&registry, &ghost, Action::Accept);

        let link = format!("?app_id={ghost}&action=accept&token={mac}");
        assert!(matches!(
            registry.handle_link(&link).expect("Should handle"),
            LinkOutcome::Ignored
        ));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_link_with_missing_parameter_is_ignored() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        let id = create_scenario(&registry);

        for link in [
            format!("http://localhost:8501/?app_id={id}&action=accept"),
            "http://localhost:8501/?action=accept&token=abc".to_string(),
            format!("http://localhost:8501/?app_id={id}&action=approve&token=abc"),
            "http://localhost:8501/".to_string(),
        ] {
            assert!(matches!(
                registry.handle_link(&link).expect("Should handle"),
                LinkOutcome::Ignored
            ));
        }
        assert!(registry.get(&id).expect("Should load").is_some());
    }

    #[test]
    fn test_duplicate_username_stores_nothing() {
        let (_dir, registry) = registry(Arc::new(RecordingNotifier::default()));
        registry.directory().seed().expect("Should seed");

        let form = valid_form("DR.Smith", "hunter22");
        let result = registry.create(&form, PasswordDigest::legacy_sha256("hunter22"), noon());

        assert!(matches!(result, Err(OncodeskError::DuplicateUsername(ref u)) if u == "dr.smith"));
        assert!(registry.pending().expect("Should list").is_empty());
    }

    #[test]
    fn test_submit_reports_all_validation_errors() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_dir, registry) = registry(Arc::clone(&notifier));

        let mut form = valid_form("dr.lee", "hunter22");
        form.email = "not-an-email".to_string();
        form.confirm_password = "different".to_string();
        form.terms_accepted = false;

        match registry.submit(&form) {
            Err(OncodeskError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("Expected validation errors, got {other:?}"),
        }
        assert!(registry.pending().expect("Should list").is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_submit_notifies_admin_with_working_links() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_dir, registry) = registry(Arc::clone(&notifier));

        let submission = registry
            .submit(&valid_form("Dr.Lee", "hunter22"))
            .expect("Should submit");
        assert!(submission.delivery.is_sent());
        assert!(submission.application_id.as_str().ends_with("_dr.lee"));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@clinic.example");
        assert!(submission
            .links
            .accept
            .starts_with("http://localhost:8501/?app_id="));

        let stored = registry.pending().expect("Should list");
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].password_hash.as_str().contains("hunter22"));

        let outcome = registry
            .handle_link(&submission.links.accept)
            .expect("Should handle");
        assert!(matches!(outcome, LinkOutcome::Decided { .. }));
        assert!(registry.directory().authenticate("dr.lee", "hunter22").is_ok());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].subject, "Your Account Has Been Approved");
    }

    #[test]
    fn test_notifier_failure_keeps_application() {
        let (_dir, registry) = registry(Arc::new(FailingNotifier));

        let submission = registry
            .submit(&valid_form("dr.lee", "hunter22"))
            .expect("Delivery failure is not an error");

        assert!(matches!(submission.delivery, Delivery::Failed(_)));
        assert!(registry
            .get(&submission.application_id)
            .expect("Should load")
            .is_some());
    }

    #[test]
    fn test_notifier_failure_does_not_undo_accept() {
        let (_dir, registry) = registry(Arc::new(FailingNotifier));
        let id = create_scenario(&registry);
        let links = registry.action_links(&id);

        match registry.handle_link(&links.accept).expect("Should handle") {
            LinkOutcome::Decided { delivery, .. } => {
                assert!(matches!(delivery, Delivery::Failed(_)));
            }
            LinkOutcome::Ignored => panic!("Expected a decision"),
        }
        assert!(registry.directory().authenticate("dr.lee", "hunter22").is_ok());
    }
}
