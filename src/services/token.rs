//! Signed-token codec shared with the payment gateway.
//!
//! Tokens are compact HS256 JWTs over a claims map, stamped with issued-at
//! and expiry timestamps. The same symmetric secret signs outbound order
//! payloads and verifies inbound callback tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;

#[derive(Clone)]
pub struct TokenCodec {
    secret: Secret<String>,
}

#[derive(Serialize)]
struct TimestampedClaims<'a, T: Serialize> {
    #[serde(flatten)]
    claims: &'a T,
    iat: i64,
    exp: i64,
}

impl TokenCodec {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }

    /// Sign a claims map into a token valid for `ttl` from now.
    pub fn sign<T: Serialize>(&self, claims: &T, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let body = TimestampedClaims {
            claims,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &body,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    /// Verify a token's signature and expiry and decode its claims.
    ///
    /// Claim semantics (merchant reference, payment status, access key) are
    /// the caller's responsibility; this only rejects signature mismatch,
    /// past expiry, and malformed structure.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<T>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )?;

        Ok(data.claims)
    }

    /// Boolean validity pre-check used by the front end before it calls the
    /// full verification endpoint. No claim inspection.
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify::<serde_json::Value>(token).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestClaims {
        merchant_reference: String,
        payment_status: String,
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(Secret::new("test-signing-secret".to_string()))
    }

    fn claims() -> TestClaims {
        TestClaims {
            merchant_reference: "ref-123".to_string(),
            payment_status: "PAID".to_string(),
        }
    }

    #[test]
    fn round_trip_preserves_claims() {
        let codec = codec();
        let token = codec.sign(&claims(), Duration::minutes(10)).unwrap();

        let decoded: TestClaims = codec.verify(&token).unwrap();
        assert_eq!(decoded, claims());
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        // Expiry well in the past, beyond any clock leeway.
        let token = codec.sign(&claims(), Duration::hours(-2)).unwrap();

        let result = codec.verify::<TestClaims>(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
        assert!(!codec.is_valid(&token));
    }

    #[test]
    fn forged_signature_is_rejected() {
        let signer = TokenCodec::new(Secret::new("attacker-secret".to_string()));
        let token = signer.sign(&claims(), Duration::minutes(10)).unwrap();

        let result = codec().verify::<TestClaims>(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let result = codec().verify::<TestClaims>("not.a.token");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
        assert!(!codec().is_valid("garbage"));
    }
}
