//! Session token verification.
//!
//! Authenticated callers present a session JWT signed with Ed25519 by the
//! upstream identity provider. The provider's public key is configured
//! statically, so verification needs no network round trip.
//!
//! Checks, in order:
//! 1. Size limit (before any parsing)
//! 2. EdDSA signature
//! 3. `exp`
//! 4. `iat` not beyond the configured clock skew
//!
//! Every failure yields the same generic `InvalidToken` message.

use crate::config::ConfigError;
use crate::errors::MeetError;
use common::jwt::{check_token_size, decode_ed25519_public_key_pem, validate_iat, SessionClaims};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use tracing::instrument;

const INVALID_SESSION: &str = "The session token is invalid or expired";

/// Verifies upstream session tokens against a single Ed25519 public key.
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    clock_skew: Duration,
}

impl SessionVerifier {
    /// Build a verifier from a PEM-encoded Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSessionKey` if the PEM cannot be decoded.
    pub fn from_pem(pem: &str, clock_skew_seconds: i64) -> Result<Self, ConfigError> {
        let key_bytes = decode_ed25519_public_key_pem(pem)
            .map_err(|e| ConfigError::InvalidSessionKey(e.to_string()))?;

        Ok(Self {
            decoding_key: DecodingKey::from_ed_der(&key_bytes),
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        })
    }

    /// Verify a session token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `MeetError::InvalidToken` for every validation failure.
    #[instrument(skip_all, name = "meet.auth.verify_session")]
    pub fn verify(&self, token: &str) -> Result<SessionClaims, MeetError> {
        check_token_size(token).map_err(|_| invalid())?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(target: "meet.auth", error = %e, "Session token verification failed");
                invalid()
            })?;

        if let Err(e) = validate_iat(token_data.claims.iat, self.clock_skew) {
            tracing::debug!(target: "meet.auth", error = ?e, "Session token iat validation failed");
            return Err(invalid());
        }

        Ok(token_data.claims)
    }
}

fn invalid() -> MeetError {
    MeetError::InvalidToken(INVALID_SESSION.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::Utc;
    use common::jwt::MAX_JWT_SIZE_BYTES;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use ring::signature::{Ed25519KeyPair, KeyPair};

    struct Keys {
        public_pem: String,
        private_pkcs8: Vec<u8>,
    }

    fn keys(seed_byte: u8) -> Keys {
        let seed = [seed_byte; 32];
        let pair = Ed25519KeyPair::from_seed_unchecked(&seed).unwrap();
        let public_pem = format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----",
            STANDARD.encode(pair.public_key().as_ref())
        );

        let mut pkcs8 = vec![
            0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22,
            0x04, 0x20,
        ];
        pkcs8.extend_from_slice(&seed);

        Keys {
            public_pem,
            private_pkcs8: pkcs8,
        }
    }

    fn claims(iat: i64, exp: i64) -> SessionClaims {
        SessionClaims {
            sub: "user:7".to_string(),
            email: "grace@example.com".to_string(),
            name: Some("Grace".to_string()),
            roles: vec![],
            iat,
            exp,
        }
    }

    fn sign(keys: &Keys, claims: &SessionClaims) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some("idp-1".to_string());
        encode(
            &header,
            claims,
            &EncodingKey::from_ed_der(&keys.private_pkcs8),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let keys = keys(3);
        let verifier = SessionVerifier::from_pem(&keys.public_pem, 300).unwrap();
        let now = Utc::now().timestamp();

        let verified = verifier.verify(&sign(&keys, &claims(now, now + 600))).unwrap();
        assert_eq!(verified.user_id(), Some(7));
        assert_eq!(verified.email, "grace@example.com");
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let verifier = SessionVerifier::from_pem(&keys(3).public_pem, 300).unwrap();
        let now = Utc::now().timestamp();
        let token = sign(&keys(4), &claims(now, now + 600));

        assert!(matches!(
            verifier.verify(&token),
            Err(MeetError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let keys = keys(3);
        let verifier = SessionVerifier::from_pem(&keys.public_pem, 300).unwrap();
        let now = Utc::now().timestamp();

        let token = sign(&keys, &claims(now - 7200, now - 3600));
        assert!(matches!(
            verifier.verify(&token),
            Err(MeetError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_rejects_future_iat() {
        let keys = keys(3);
        let verifier = SessionVerifier::from_pem(&keys.public_pem, 60).unwrap();
        let now = Utc::now().timestamp();

        let token = sign(&keys, &claims(now + 3600, now + 7200));
        assert!(matches!(
            verifier.verify(&token),
            Err(MeetError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_rejects_oversized_and_garbage() {
        let keys = keys(3);
        let verifier = SessionVerifier::from_pem(&keys.public_pem, 300).unwrap();

        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(verifier.verify(&oversized).is_err());
        assert!(verifier.verify("not-a-jwt").is_err());
        assert!(verifier.verify("").is_err());
    }

    #[test]
    fn test_from_pem_rejects_invalid_key() {
        let result = SessionVerifier::from_pem("-----BEGIN PUBLIC KEY-----\n@@@\n", 300);
        assert!(matches!(result, Err(ConfigError::InvalidSessionKey(_))));
    }
}
