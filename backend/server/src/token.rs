//! Access token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the account id and role. Verification checks the signature and
//! the `exp` claim; anything else about the token is opaque to the rest of the crate.
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{
    error::{AppError, DenyReason},
    models::{Claims, Principal, Role},
};

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, account_id: i64, role: Role) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AppError::Internal("token lifetime out of range".into()))?;

        self.sign(&Claims {
            sub: account_id.to_string(),
            role,
            iat: now,
            exp: now + ttl,
        })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        Principal::try_from(data.claims).map_err(|_| AppError::Denied(DenyReason::InvalidToken))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer();
        let token = issuer.issue(42, Role::Chef).unwrap();

        let principal = issuer.verify(&token).unwrap();
        assert_eq!(principal.id, 42);
        assert_eq!(principal.role, Role::Chef);
        assert_eq!(principal.claims.exp - principal.claims.iat, 3600);
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let token = issuer
            .sign(&Claims {
                sub: "1".into(),
                role: Role::User,
                iat: now - 120,
                exp: now - 60,
            })
            .unwrap();

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Denied(DenyReason::ExpiredToken))
        ));
    }

    #[test]
    fn test_foreign_signature() {
        let other = TokenIssuer::new(b"another-secret", Duration::from_secs(3600));
        let token = other.issue(1, Role::User).unwrap();

        assert!(matches!(
            issuer().verify(&token),
            Err(AppError::Denied(DenyReason::InvalidToken))
        ));
    }

    #[test]
    fn test_non_numeric_subject() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let token = issuer
            .sign(&Claims {
                sub: "chef@example.com".into(),
                role: Role::Chef,
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert!(matches!(
            issuer.verify(&token),
            Err(AppError::Denied(DenyReason::InvalidToken))
        ));
    }

    #[test]
    fn test_malformed_token() {
        for token in ["", "not-a-token", "a.b.c"] {
            assert!(matches!(
                issuer().verify(token),
                Err(AppError::Denied(DenyReason::InvalidToken))
            ));
        }
    }
}
