//! Signed, time-limited tokens carrying a user id.
//!
//! Two payload shapes share one HS256 signer:
//! - confirmation tokens `{"confirm": id, "exp": ..}` flip an account to confirmed
//! - auth tokens `{"id": id, "exp": ..}` stand in for a password on API calls
//!
//! Nothing is persisted. A token is valid while its signature checks out and
//! `exp` has not passed. Verification fails closed: callers only ever see
//! `false` / `None`, never the reason.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret must be non-empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfirmClaims {
    confirm: i32,
    exp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthClaims {
    id: i32,
    exp: u64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn issue_confirmation_token(&self, user_id: i32, ttl: Duration) -> Result<String, TokenError> {
        self.sign(&ConfirmClaims {
            confirm: user_id,
            exp: expiry(ttl),
        })
    }

    pub fn issue_auth_token(&self, user_id: i32, ttl: Duration) -> Result<String, TokenError> {
        self.sign(&AuthClaims {
            id: user_id,
            exp: expiry(ttl),
        })
    }

    /// True only if the token is intact, unexpired, a confirmation token, and
    /// was issued for `expected_user_id`.
    #[must_use]
    pub fn verify_confirmation_token(&self, token: &str, expected_user_id: i32) -> bool {
        self.open::<ConfirmClaims>(token)
            .is_some_and(|claims| claims.confirm == expected_user_id)
    }

    #[must_use]
    pub fn verify_auth_token(&self, token: &str) -> Option<i32> {
        self.open::<AuthClaims>(token).map(|claims| claims.id)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    fn open<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        match decode::<T>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected");
                None
            }
        }
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenService([REDACTED])")
    }
}

fn expiry(ttl: Duration) -> u64 {
    get_current_timestamp().saturating_add(ttl.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn service() -> TokenService {
        TokenService::new(b"Ahardtoguessstring").unwrap()
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(TokenService::new(b""), Err(TokenError::EmptySecret)));
    }

    #[test]
    fn test_valid_confirmation_token() {
        let tokens = service();
        let token = tokens.issue_confirmation_token(1, HOUR).unwrap();
        assert!(tokens.verify_confirmation_token(&token, 1));
        // Verification has no side effects, so repeating it is fine.
        assert!(tokens.verify_confirmation_token(&token, 1));
    }

    #[test]
    fn test_confirmation_token_for_other_user() {
        let tokens = service();
        let token = tokens.issue_confirmation_token(1, HOUR).unwrap();
        assert!(!tokens.verify_confirmation_token(&token, 2));
    }

    #[test]
    fn test_auth_token_round_trip() {
        let tokens = service();
        let token = tokens.issue_auth_token(42, HOUR).unwrap();
        assert_eq!(tokens.verify_auth_token(&token), Some(42));
    }

    #[test]
    fn test_payload_shapes_are_not_interchangeable() {
        let tokens = service();
        let confirm = tokens.issue_confirmation_token(7, HOUR).unwrap();
        let auth = tokens.issue_auth_token(7, HOUR).unwrap();

        assert_eq!(tokens.verify_auth_token(&confirm), None);
        assert!(!tokens.verify_confirmation_token(&auth, 7));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = service().issue_auth_token(1, HOUR).unwrap();
        let other = TokenService::new(b"another-secret").unwrap();
        assert_eq!(other.verify_auth_token(&token), None);
        assert!(!other.verify_confirmation_token(
            &service().issue_confirmation_token(1, HOUR).unwrap(),
            1
        ));
    }

    #[test]
    fn test_malformed_tokens_fail() {
        let tokens = service();
        for garbage in ["", "abc", "a.b.c", "sec@john.me"] {
            assert_eq!(tokens.verify_auth_token(garbage), None);
            assert!(!tokens.verify_confirmation_token(garbage, 1));
        }
    }

    #[test]
    fn test_tampered_token_fails() {
        let tokens = service();
        let mine: Vec<String> = tokens
            .issue_auth_token(1, HOUR)
            .unwrap()
            .split('.')
            .map(str::to_string)
            .collect();
        let theirs: Vec<String> = tokens
            .issue_auth_token(2, HOUR)
            .unwrap()
            .split('.')
            .map(str::to_string)
            .collect();

        // Their payload under my signature.
        let spliced = format!("{}.{}.{}", mine[0], theirs[1], mine[2]);
        assert_eq!(tokens.verify_auth_token(&spliced), None);
    }

    #[tokio::test]
    async fn test_expired_tokens_fail() {
        let tokens = service();
        let confirm = tokens
            .issue_confirmation_token(1, Duration::from_secs(1))
            .unwrap();
        let auth = tokens.issue_auth_token(1, Duration::from_secs(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert!(!tokens.verify_confirmation_token(&confirm, 1));
        assert_eq!(tokens.verify_auth_token(&auth), None);
    }
}
