//! Approval link wire format.
//!
//! Links look like `{base}/?app_id={id}&action={accept|reject}&token={mac}`.
//! The three query parameters are the entire inbound contract.

use url::{form_urlencoded, Url};

use super::application::{Action, ApplicationId};

const APP_ID_PARAM: &str = "app_id";
const ACTION_PARAM: &str = "action";
const TOKEN_PARAM: &str = "token";

/// Parameters carried by an inbound approval link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub application_id: ApplicationId,
    pub action: Action,
    pub token: String,
}

impl LinkRequest {
    /// Parse a full URL, or a relative one such as `/?app_id=..`.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        match Url::parse(url) {
            Ok(parsed) => Self::from_pairs(parsed.query_pairs()),
            Err(_) => {
                let (_, query) = url.split_once('?')?;
                Self::from_query(query)
            }
        }
    }

    /// Parse a query string such as `app_id=..&action=..&token=..`.
    ///
    /// Returns `None` when any parameter is absent or empty, or when the
    /// action is not one of the two literals. Later duplicates win.
    #[must_use]
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.split('#').next().unwrap_or_default();
        Self::from_pairs(form_urlencoded::parse(query.trim_start_matches('?').as_bytes()))
    }

    fn from_pairs<'a, I>(pairs: I) -> Option<Self>
    where
        I: Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    {
        let mut app_id = None;
        let mut action = None;
        let mut token = None;

        for (key, value) in pairs {
            match key.as_ref() {
                APP_ID_PARAM => app_id = Some(value.into_owned()),
                ACTION_PARAM => action = Some(value.into_owned()),
                TOKEN_PARAM => token = Some(value.into_owned()),
                _ => {}
            }
        }

        let app_id = app_id.filter(|v| !v.is_empty())?;
        let action = action.and_then(|v| v.parse::<Action>().ok())?;
        let token = token.filter(|v| !v.is_empty())?;

        Some(Self {
            application_id: ApplicationId::new(app_id),
            action,
            token,
        })
    }
}

/// Build the URL an administrator follows to decide an application.
#[must_use]
pub fn action_url(base_url: &str, application_id: &ApplicationId, action: Action, token: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(APP_ID_PARAM, application_id.as_str())
        .append_pair(ACTION_PARAM, action.as_str())
        .append_pair(TOKEN_PARAM, token)
        .finish();
    format!("{}/?{query}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_url_layout() {
        let url = action_url(
            "http://localhost:8501/",
            &ApplicationId::new("APP_20240101_120000_dr.lee"),
            Action::Accept,
            "abc123",
        );
        assert_eq!(
            url,
            "http://localhost:8501/?app_id=APP_20240101_120000_dr.lee&action=accept&token=abc123"
        );
    }

    #[test]
    fn test_parse_built_url() {
        let id = ApplicationId::new("APP_20240101_120000_dr.lee");
        let url = action_url("https://desk.example", &id, Action::Reject, "ff00");
        let request = LinkRequest::from_url(&url).expect("Should parse");

        assert_eq!(request.application_id, id);
        assert_eq!(request.action, Action::Reject);
        assert_eq!(request.token, "ff00");
    }

    #[test]
    fn test_missing_parameters_are_ignored() {
        assert!(LinkRequest::from_query("action=accept&token=ab").is_none());
        assert!(LinkRequest::from_query("app_id=APP_1&token=ab").is_none());
        assert!(LinkRequest::from_query("app_id=APP_1&action=accept").is_none());
        assert!(LinkRequest::from_query("app_id=APP_1&action=accept&token=").is_none());
        assert!(LinkRequest::from_url("https://desk.example/").is_none());
    }

    #[test]
    fn test_unknown_action_literal_is_ignored() {
        assert!(LinkRequest::from_query("app_id=APP_1&action=approve&token=ab").is_none());
        assert!(LinkRequest::from_query("app_id=APP_1&action=Accept&token=ab").is_none());
    }

    #[test]
    fn test_percent_decoding() {
        let request = LinkRequest::from_query("?app_id=APP%5F1&action=accept&token=a%2Bb&utm=x#frag")
            .expect("Should parse");
        assert_eq!(request.application_id.as_str(), "APP_1");
        assert_eq!(request.token, "a+b");
    }

    #[test]
    fn test_malformed_escapes_pass_through_literally() {
        let request = LinkRequest::from_query("app_id=APP%+41&action=accept&token=ab")
            .expect("Should parse");
        assert_eq!(request.application_id.as_str(), "APP%+41");

        let request = LinkRequest::from_query("app_id=APP%Z1&action=accept&token=ab")
            .expect("Should parse");
        assert_eq!(request.application_id.as_str(), "APP%Z1");
    }

    #[test]
    fn test_relative_and_reserved_characters() {
        let id = ApplicationId::new("APP_1 &x=y");
        let url = action_url("https://desk.example/", &id, Action::Accept, "t/k+n");
        let request = LinkRequest::from_url(&url).expect("Should parse");
        assert_eq!(request.application_id, id);
        assert_eq!(request.token, "t/k+n");

        let request = LinkRequest::from_url("/?app_id=APP_1&action=reject&token=ab#frag")
            .expect("Should parse relative link");
        assert_eq!(request.action, Action::Reject);
        assert_eq!(request.token, "ab");
    }
}
