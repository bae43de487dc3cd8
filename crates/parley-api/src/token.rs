//! Signed, time-limited bearer tokens (HS256 JWT).
//!
//! Tokens are stateless: nothing is recorded server-side, so a token stays
//! valid until its `exp` even after logout. There is no revocation list.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_types::api::Claims;

use crate::error::AppError;

const OAUTH_STATE_AUDIENCE: &str = "oauth-state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Claims of the `state` parameter round-tripped through the identity provider.
#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    aud: String,
    nonce: String,
    iat: i64,
    exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a bearer token whose subject is `email`.
    pub fn issue(&self, email: &str) -> Result<String, AppError> {
        self.issue_at(email, Utc::now())
    }

    /// Issue a token as if it had been minted at `issued_at`.
    pub fn issue_at(&self, email: &str, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = Claims {
            sub: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(token)
    }

    /// Resolve a bearer token to its subject email.
    pub fn validate(&self, token: &str) -> Result<String, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::TokenInvalid,
            }
        })?;

        Ok(data.claims.sub)
    }

    /// Mint the anti-forgery `state` for a federated login redirect.
    pub fn issue_oauth_state(&self) -> Result<String, AppError> {
        self.issue_oauth_state_at(Utc::now())
    }

    pub fn issue_oauth_state_at(&self, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let claims = StateClaims {
            aud: OAUTH_STATE_AUDIENCE.to_string(),
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn verify_oauth_state(&self, state: &str) -> Result<(), AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[OAUTH_STATE_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "aud"]);

        decode::<StateClaims>(state, &self.decoding, &validation)
            .map(|_| ())
            .map_err(|e| {
                debug!("Rejected OAuth state: {}", e);
                AppError::IdentityProvider("invalid or expired login state".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(1))
    }

    #[test]
    fn issued_token_validates_to_subject() {
        let tokens = service();
        let token = tokens.issue("a@x.com").unwrap();
        assert_eq!(tokens.validate(&token).unwrap(), "a@x.com");
    }

    #[test]
    fn token_has_three_segments() {
        let token = service().issue("a@x.com").unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn token_past_expiry_is_expired() {
        let tokens = service();
        let token = tokens
            .issue_at("a@x.com", Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(tokens.validate(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let other = TokenService::new(b"another-secret-another-secret-xx", Duration::hours(1));
        let token = other.issue("a@x.com").unwrap();
        assert!(matches!(service().validate(&token), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn tampered_or_garbage_tokens_are_invalid() {
        let tokens = service();
        let token = tokens.issue("a@x.com").unwrap();
        let mut tampered = token.clone();
        tampered.push('A');

        assert!(matches!(tokens.validate(&tampered), Err(AppError::TokenInvalid)));
        assert!(matches!(tokens.validate("not-a-token"), Err(AppError::TokenInvalid)));
        assert!(matches!(tokens.validate(""), Err(AppError::TokenInvalid)));
    }

    #[test]
    fn oauth_state_is_not_a_bearer_token() {
        let tokens = service();
        let state = tokens.issue_oauth_state().unwrap();
        assert!(tokens.verify_oauth_state(&state).is_ok());
        assert!(tokens.validate(&state).is_err());

        let bearer = tokens.issue("a@x.com").unwrap();
        assert!(tokens.verify_oauth_state(&bearer).is_err());
    }

    #[test]
    fn stale_or_foreign_oauth_state_is_rejected() {
        let tokens = service();
        let stale = tokens
            .issue_oauth_state_at(Utc::now() - Duration::minutes(OAUTH_STATE_TTL_MINUTES + 1))
            .unwrap();
        assert!(matches!(tokens.verify_oauth_state(&stale), Err(AppError::IdentityProvider(_))));

        let other = TokenService::new(b"another-secret-another-secret-xx", Duration::hours(1));
        let foreign = other.issue_oauth_state().unwrap();
        assert!(matches!(tokens.verify_oauth_state(&foreign), Err(AppError::IdentityProvider(_))));
    }
}
