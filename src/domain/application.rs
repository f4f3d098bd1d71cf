//! Pending registration requests and their terminal decisions.

use serde::{Deserialize, Serialize};

use super::doctor::{Doctor, PasswordDigest, SignupForm, Username};

/// Text format of `PendingApplication::application_date`.
pub const APPLICATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier of a pending application: `APP_<date>_<time>_<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Wrap an identifier received from storage or an inbound link.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a fresh identifier from the submission time and the requested username.
    ///
    /// Second resolution plus the username suffix keeps ids distinct for
    /// different candidates submitting at the same moment.
    #[must_use]
    pub fn generate(username: &Username, submitted_at: chrono::NaiveDateTime) -> Self {
        Self(format!(
            "APP_{}_{}",
            submitted_at.format("%Y%m%d_%H%M%S"),
            username.as_str()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Administrator decision carried by an action link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accept,
    Reject,
}

impl Action {
    /// Wire literal embedded in links and in the signed message.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    /// Only the exact lower-case literals are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("Unknown action literal: {other}")),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registration request awaiting an administrator decision.
#[derive(Debug, Clone)]
pub struct PendingApplication {
    pub application_id: ApplicationId,
    pub username: Username,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience: u32,
    pub license: String,
    pub hospital: String,
    pub password_hash: PasswordDigest,
    pub notes: String,
    pub application_date: chrono::NaiveDateTime,
}

impl PendingApplication {
    /// Build the stored application from a validated form.
    ///
    /// The plaintext password never leaves the form; only `password_hash` is kept.
    #[must_use]
    pub fn from_form(
        form: &SignupForm,
        password_hash: PasswordDigest,
        submitted_at: chrono::NaiveDateTime,
    ) -> Self {
        let username = form.username();
        Self {
            application_id: ApplicationId::generate(&username, submitted_at),
            username,
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            phone: form.phone.trim().to_string(),
            specialization: form.specialization.trim().to_string(),
            experience: form.experience,
            license: form.license.trim().to_string(),
            hospital: form.hospital.trim().to_string(),
            password_hash,
            notes: form.notes.trim().to_string(),
            application_date: submitted_at,
        }
    }

    /// Doctor account created when this application is accepted.
    #[must_use]
    pub fn to_doctor(&self, created_at: chrono::DateTime<chrono::Utc>) -> Doctor {
        Doctor {
            username: self.username.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            specialization: Some(self.specialization.clone()),
            password_hash: self.password_hash.clone(),
            created_at,
        }
    }

    #[must_use]
    pub fn formatted_date(&self) -> String {
        self.application_date
            .format(APPLICATION_DATE_FORMAT)
            .to_string()
    }
}

/// Terminal result of a verified transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Decision event handed to the notification boundary.
#[derive(Debug, Clone)]
pub struct Decision {
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub applicant_email: String,
    pub username: Username,
    pub outcome: Outcome,
}

impl Decision {
    #[must_use]
    pub fn new(application: &PendingApplication, outcome: Outcome) -> Self {
        Self {
            application_id: application.application_id.clone(),
            applicant_name: application.name.clone(),
            applicant_email: application.email.clone(),
            username: application.username.clone(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::doctor::tests::valid_form;

    fn noon() -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("Valid date")
    }

    #[test]
    fn test_application_id_format() {
        let id = ApplicationId::generate(&Username::new("Dr.Lee"), noon());
        assert_eq!(id.as_str(), "APP_20240101_120000_dr.lee");
    }

    #[test]
    fn test_action_literals() {
        assert_eq!("accept".parse::<Action>(), Ok(Action::Accept));
        assert_eq!("reject".parse::<Action>(), Ok(Action::Reject));
        assert!("ACCEPT".parse::<Action>().is_err());
        assert!("approve".parse::<Action>().is_err());
        assert_eq!(Action::Reject.to_string(), "reject");
    }

    #[test]
    fn test_from_form_keeps_only_digest() {
        let form = valid_form("Dr.Lee", "hunter22");
        let digest = PasswordDigest::legacy_sha256("hunter22");
        let app = PendingApplication::from_form(&form, digest.clone(), noon());

        assert_eq!(app.username.as_str(), "dr.lee");
        assert_eq!(app.password_hash, digest);
        assert_eq!(app.formatted_date(), "2024-01-01 12:00:00");
        assert_eq!(app.application_id.as_str(), "APP_20240101_120000_dr.lee");
    }

    #[test]
    fn test_to_doctor_carries_hash() {
        let form = valid_form("dr.lee", "hunter22");
        let app =
            PendingApplication::from_form(&form, PasswordDigest::legacy_sha256("hunter22"), noon());
        let doctor = app.to_doctor(chrono::Utc::now());

        assert_eq!(doctor.username, app.username);
        assert_eq!(doctor.email.as_deref(), Some("grace.lee@hospital.example"));
        assert!(doctor.verify_password("hunter22"));
    }
}
