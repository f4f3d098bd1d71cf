//! Email content for the admission workflow.
//!
//! Only content is built here; delivery goes through the `Notifier` port.
//! Every applicant-supplied value is HTML-escaped.

use crate::domain::{Decision, Outcome, PendingApplication};
use crate::ports::Email;

use super::registry::ActionLinks;

const FOOTER: &str = "<hr><p style='font-size:12px;color:#666'>Medical Diagnosis System</p>";

/// Escape text for inclusion in an HTML body or attribute.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Notice to the administrator for a new application, with both action links.
#[must_use]
pub fn admin_notice(admin_email: &str, application: &PendingApplication, links: &ActionLinks) -> Email {
    let field = |label: &str, value: &str| {
        format!("<p><strong>{label}:</strong> {}</p>\n", escape_html(value))
    };

    let mut details = String::new();
    details.push_str(&field("Full Name", &application.name));
    details.push_str(&field("Email", &application.email));
    details.push_str(&field("Specialization", &application.specialization));
    details.push_str(&field("License Number", &application.license));
    details.push_str(&field("Hospital/Clinic", &application.hospital));
    details.push_str(&field("Phone Number", &application.phone));
    details.push_str(&field("Years of Experience", &application.experience.to_string()));
    details.push_str(&field("Requested Username", application.username.as_str()));
    details.push_str(&field("Application Date", &application.formatted_date()));

    let notes = if application.notes.is_empty() {
        "No additional notes provided.".to_string()
    } else {
        escape_html(&application.notes)
    };

    let html_body = format!(
        "<html><body>\n\
         <h2>Medical Diagnosis System - New Doctor Registration</h2>\n\
         <p>A new doctor has requested access to the Medical Diagnosis System:</p>\n\
         <div>\n<h3>Doctor Information:</h3>\n{details}</div>\n\
         <div>\n<h4>Additional Notes:</h4>\n<p>{notes}</p>\n</div>\n\
         <div>\n<p><strong>Action Required:</strong> review this application.</p>\n\
         <p><a href=\"{accept}\">Approve</a> | <a href=\"{reject}\">Reject</a></p>\n</div>\n\
         <p style='color:#666;font-size:12px'>Application ID: {id}</p>\n\
         {FOOTER}\n</body></html>\n",
        accept = escape_html(&links.accept),
        reject = escape_html(&links.reject),
        id = escape_html(application.application_id.as_str()),
    );

    Email {
        to: admin_email.to_string(),
        subject: format!("New Doctor Registration Request - {}", application.name),
        html_body,
    }
}

/// Notice to an applicant whose account was approved.
#[must_use]
pub fn approval_notice(decision: &Decision, login_url: &str) -> Email {
    let html_body = format!(
        "<html><body>\n\
         <h2>Application Approved</h2>\n\
         <p>Dear {name},</p>\n\
         <p>Your application (ID {id}) has been <strong>approved</strong>. \
         You can now log in using your chosen username <strong>{username}</strong>.</p>\n\
         <p>For security, we never send your password back. \
         Use the password you created during signup.</p>\n\
         <p><a href=\"{login}\">Log In Now</a></p>\n\
         {FOOTER}\n</body></html>\n",
        name = escape_html(&decision.applicant_name),
        id = escape_html(decision.application_id.as_str()),
        username = escape_html(decision.username.as_str()),
        login = escape_html(login_url),
    );

    Email {
        to: decision.applicant_email.clone(),
        subject: "Your Account Has Been Approved".to_string(),
        html_body,
    }
}

/// Notice to an applicant whose application was declined.
#[must_use]
pub fn rejection_notice(decision: &Decision) -> Email {
    let html_body = format!(
        "<html><body>\n\
         <h2>Application Update</h2>\n\
         <p>Dear {name},</p>\n\
         <p>Your application (ID {id}) was <strong>not approved</strong> at this time.</p>\n\
         <p>If you believe this is an error you may reapply with updated information.</p>\n\
         {FOOTER}\n</body></html>\n",
        name = escape_html(&decision.applicant_name),
        id = escape_html(decision.application_id.as_str()),
    );

    Email {
        to: decision.applicant_email.clone(),
        subject: "Application Status Update".to_string(),
        html_body,
    }
}

/// Applicant notice matching the decision's outcome.
#[must_use]
pub fn decision_notice(decision: &Decision, login_url: &str) -> Email {
    match decision.outcome {
        Outcome::Approved => approval_notice(decision, login_url),
        Outcome::Rejected => rejection_notice(decision),
    }
}
