//! Capability tokens for approval links.
//!
//! A token is `hex(HMAC-SHA256(secret, "<application_id>:<action>"))`.
//! Nothing is persisted: tokens are recomputed on demand, and single use is
//! enforced by the registry deleting the application record.
//!
//! # Memory Security
//!
//! `SigningSecret` implements `Zeroize` and `ZeroizeOnDrop` so the key is
//! erased when dropped, and its `Debug` output shows only a fingerprint.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::application::{Action, ApplicationId};

type HmacSha256 = Hmac<Sha256>;

/// Process-wide secret used to sign approval links.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret {
    inner: Vec<u8>,
}

impl SigningSecret {
    /// Create a secret from raw bytes.
    ///
    /// Callers are responsible for rejecting empty secrets (see `config`).
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Short SHA-256 fingerprint for logs (never the key itself).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.inner);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("fingerprint", &self.fingerprint())
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Signs and verifies `(application_id, action)` capability tokens.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    secret: SigningSecret,
}

impl TokenAuthority {
    #[must_use]
    pub fn new(secret: SigningSecret) -> Self {
        Self { secret }
    }

    /// Compute the token for one application and action.
    #[must_use]
    pub fn sign(&self, application_id: &ApplicationId, action: Action) -> String {
        match self.mac(application_id, action) {
            Some(tag) => tag.iter().map(|b| format!("{b:02x}")).collect(),
            None => String::new(),
        }
    }

    /// Check a presented token in constant time.
    ///
    /// Any length or byte mismatch yields `false`.
    #[must_use]
    pub fn verify(&self, application_id: &ApplicationId, action: Action, token: &str) -> bool {
        let expected = self.sign(application_id, action);
        if expected.is_empty() {
            return false;
        }
        expected.as_bytes().ct_eq(token.as_bytes()).into()
    }

    fn mac(&self, application_id: &ApplicationId, action: Action) -> Option<[u8; 32]> {
        // HMAC accepts keys of any length; this only fails on a broken build.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(application_id.as_str().as_bytes());
        mac.update(b":");
        mac.update(action.as_str().as_bytes());
        Some(mac.finalize().into_bytes().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(SigningSecret::from_bytes(b"unit-test-secret".to_vec()))
    }

    #[test]
    fn test_sign_matches_reference_mac() {
        let id = ApplicationId::new("APP_20240101_120000_dr.lee");
        assert_eq!(
            authority().sign(&id, Action::Accept),
            "9f04cbc028de623f3444540dab221df4b8e4bc5ac975e50a3dda64399623c93f"
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let authority = authority();
        for id in ["APP_20240101_120000_dr.lee", "x", ""] {
            let id = ApplicationId::new(id);
            for action in [Action::Accept, Action::Reject] {
                let token = authority.sign(&id, action);
                assert_eq!(token.len(), 64);
                assert!(authority.verify(&id, action, &token));
            }
        }
    }

    #[test]
    fn test_token_is_bound_to_action_and_id() {
        let authority = authority();
        let id = ApplicationId::new("APP_20240101_120000_dr.lee");
        let accept = authority.sign(&id, Action::Accept);

        assert!(!authority.verify(&id, Action::Reject, &accept));
        assert!(!authority.verify(&ApplicationId::new("APP_20240101_120000_dr.le"), Action::Accept, &accept));
    }

    #[test]
    fn test_mismatched_tokens_fail() {
        let authority = authority();
        let id = ApplicationId::new("APP_20240101_120000_dr.lee");
        let token = authority.sign(&id, Action::Accept);

        assert!(!authority.verify(&id, Action::Accept, ""));
        assert!(!authority.verify(&id, Action::Accept, &token[..63]));
        assert!(!authority.verify(&id, Action::Accept, &format!("{token}0")));
        assert!(!authority.verify(&id, Action::Accept, &token.to_uppercase()));

        let mut flipped = token.clone().into_bytes();
        flipped[10] = if flipped[10] == b'a' { b'b' } else { b'a' };
        let flipped = String::from_utf8(flipped).expect("Still ASCII");
        assert!(!authority.verify(&id, Action::Accept, &flipped));
    }

    #[test]
    fn test_other_secret_cannot_forge() {
        let id = ApplicationId::new("APP_20240101_120000_dr.lee");
        let forged = TokenAuthority::new(SigningSecret::from_bytes(b"guess".to_vec()))
            .sign(&id, Action::Accept);
        assert!(!authority().verify(&id, Action::Accept, &forged));
    }

    #[test]
    fn test_secret_debug_no_leak() {
        let secret = SigningSecret::from_bytes(b"unit-test-secret".to_vec());
        let output = format!("{secret:?}");
        assert!(!output.contains("unit-test-secret"));
        assert!(output.contains("fingerprint"));
        assert_eq!(secret.fingerprint().len(), 16);
    }
}
