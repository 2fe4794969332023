//! Connection identity verification.
//!
//! Tokens are issued elsewhere (the login flow); this side only checks them.
//! A client presents its token in the `token` query parameter of the upgrade
//! request:
//!
//! ```text
//! GET /ws?token=<jwt> HTTP/1.1
//! Upgrade: websocket
//! ```
//!
//! Verification happens during the handshake, before the hub learns about
//! the connection, so an unauthenticated client never occupies a slot.

use std::borrow::Cow;

use chatline_core::Identity;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

/// Why a token was not accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The upgrade request had no `token` query parameter
    #[error("token required")]
    MissingToken,

    /// Signature, expiry or structure check failed
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token verified but names no user
    #[error("token carries no user id")]
    MissingSubject,
}

/// Maps a bearer token to the identity it authenticates.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Verify `token` and return its identity.
    ///
    /// # Errors
    ///
    /// Any `AuthError` rejects the upgrade with HTTP 401.
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

impl<F> IdentityVerifier for F
where
    F: Fn(&str) -> Option<Identity> + Send + Sync + 'static,
{
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self(token).ok_or_else(|| AuthError::InvalidToken("rejected".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// HS256 JWT verifier sharing its secret with the token issuer.
///
/// The user id is read from the `user_id` claim, falling back to `sub`.
/// `exp` is required and enforced.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self { key: DecodingKey::from_secret(secret), validation }
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;

        let Claims { user_id, sub } = data.claims;
        user_id
            .or(sub)
            .filter(|id| !id.is_empty())
            .map(Identity::from)
            .ok_or(AuthError::MissingSubject)
    }
}

/// Extract and percent-decode the `token` parameter from a URI query string.
pub(crate) fn token_from_query(query: Option<&str>) -> Option<Cow<'_, str>> {
    let raw = query?
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value)?;

    urlencoding::decode(raw).ok().filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
    use serde::Serialize;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sub: Option<&'a str>,
        exp: u64,
    }

    fn token(claims: &TestClaims<'_>, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn valid_until() -> u64 {
        get_current_timestamp() + 3600
    }

    #[test]
    fn accepts_user_id_claim() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(&TestClaims { user_id: Some("u-42"), sub: None, exp: valid_until() }, SECRET);

        assert_eq!(verifier.verify(&jwt), Ok(Identity::new("u-42")));
    }

    #[test]
    fn falls_back_to_sub() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(&TestClaims { user_id: None, sub: Some("u-7"), exp: valid_until() }, SECRET);

        assert_eq!(verifier.verify(&jwt), Ok(Identity::new("u-7")));
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt =
            token(&TestClaims { user_id: Some("u-1"), sub: None, exp: valid_until() }, b"other");

        assert!(matches!(verifier.verify(&jwt), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn rejects_expired() {
        let verifier = JwtVerifier::new(SECRET);
        let exp = get_current_timestamp() - 3600;
        let jwt = token(&TestClaims { user_id: Some("u-1"), sub: None, exp }, SECRET);

        assert!(matches!(verifier.verify(&jwt), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn rejects_missing_subject() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(&TestClaims { user_id: None, sub: None, exp: valid_until() }, SECRET);

        assert_eq!(verifier.verify(&jwt), Err(AuthError::MissingSubject));
    }

    #[test]
    fn closure_verifier() {
        let verifier = |token: &str| (token == "letmein").then(|| Identity::new("guest"));

        assert_eq!(verifier.verify("letmein"), Ok(Identity::new("guest")));
        assert!(verifier.verify("nope").is_err());
    }

    #[test]
    fn query_token_extraction() {
        assert_eq!(token_from_query(Some("token=abc")).as_deref(), Some("abc"));
        assert_eq!(token_from_query(Some("v=1&token=a.b.c&x")).as_deref(), Some("a.b.c"));
        assert_eq!(token_from_query(Some("token=")), None);
        assert_eq!(token_from_query(Some("tokens=abc")), None);
        assert_eq!(token_from_query(None), None);
    }

    #[test]
    fn query_token_is_percent_decoded() {
        assert_eq!(token_from_query(Some("token=a%2Eb%2Ec")).as_deref(), Some("a.b.c"));
        assert_eq!(token_from_query(Some("token=dev%2Dcarol&v=2")).as_deref(), Some("dev-carol"));
        assert_eq!(token_from_query(Some("token=%FF")), None);
    }
}
