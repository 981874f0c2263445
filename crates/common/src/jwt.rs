//! Session token helpers.
//!
//! Authenticated callers present a session JWT minted by the upstream
//! identity provider (EdDSA / Ed25519). This module holds the pieces that do
//! not depend on `jsonwebtoken` itself:
//! - Size limit checked before any parsing
//! - Clock skew constants and `iat` validation
//! - The [`SessionClaims`] shape, with identifiers redacted in Debug output
//! - Ed25519 public key decoding from PEM
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! check_token_size(token)?;
//! // ... verify signature, decode SessionClaims ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted session token size in bytes (8KB).
///
/// Checked before base64 decoding or signature verification so oversized
/// headers cost nothing beyond a length comparison.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance for `iat` (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound on configurable clock skew (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo` (RFC 8410).
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Length of a raw Ed25519 public key.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

// =============================================================================
// Errors
// =============================================================================

/// Session token validation failures.
///
/// All variants render the same client-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    #[error("The session token is invalid or expired")]
    TokenTooLarge,

    #[error("The session token is invalid or expired")]
    MalformedToken,

    #[error("The session token is invalid or expired")]
    IatTooFarInFuture,
}

/// Failure decoding a public key from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("public key is not valid base64: {0}")]
    Base64(String),

    #[error("public key has unexpected length {0}")]
    Length(usize),
}

// =============================================================================
// Claims
// =============================================================================

/// Claims carried by an upstream session token.
///
/// `sub` is either `"user:{id}"` or a bare integer id. `sub` and `email` are
/// redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,

    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    pub iat: i64,

    pub exp: i64,
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("sub", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("name", &self.name.as_ref().map(|_| "[REDACTED]"))
            .field("roles", &self.roles)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl SessionClaims {
    /// Numeric user id from `sub`, accepting `user:42` and `42`.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        let raw = self.sub.strip_prefix("user:").unwrap_or(&self.sub);
        raw.parse::<i64>().ok()
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Display name for tokens and participant records, falling back to the
    /// email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.clone(),
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens larger than [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `TokenTooLarge` when the limit is exceeded.
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Validate `iat` against the wall clock with the given skew tolerance.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` when `iat` is more than `clock_skew` ahead.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat,
            now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an Ed25519 public key from PEM into the raw 32 key bytes.
///
/// Accepts both a standard `SubjectPublicKeyInfo` PEM (as written by
/// `openssl pkey -pubout`) and a PEM wrapping the bare 32-byte key. Header
/// lines are optional.
///
/// # Errors
///
/// Returns `KeyDecodeError` when the body is not base64 or decodes to
/// neither form.
pub fn decode_ed25519_public_key_pem(pem: &str) -> Result<Vec<u8>, KeyDecodeError> {
    let b64: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();

    let der = STANDARD
        .decode(b64)
        .map_err(|e| KeyDecodeError::Base64(e.to_string()))?;

    if der.len() == ED25519_PUBLIC_KEY_LEN {
        return Ok(der);
    }

    match der.strip_prefix(&ED25519_SPKI_PREFIX[..]) {
        Some(raw) if raw.len() == ED25519_PUBLIC_KEY_LEN => Ok(raw.to_vec()),
        _ => Err(KeyDecodeError::Length(der.len())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> SessionClaims {
        SessionClaims {
            sub: sub.to_string(),
            email: "ada@example.com".to_string(),
            name: Some("Ada Lovelace".to_string()),
            roles: vec!["user".to_string()],
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        }
    }

    #[test]
    fn test_clock_skew_constants() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    #[test]
    fn test_check_token_size_boundary() {
        let at_limit = "a".repeat(MAX_JWT_SIZE_BYTES);
        assert!(check_token_size(&at_limit).is_ok());

        let over = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            check_token_size(&over),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_validate_iat_within_skew() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_iat_at(now - 86_400, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_beyond_skew() {
        let now = 1_700_000_000;
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_user_id_accepts_prefixed_and_bare() {
        assert_eq!(claims("user:42").user_id(), Some(42));
        assert_eq!(claims("7").user_id(), Some(7));
        assert_eq!(claims("service:42").user_id(), None);
        assert_eq!(claims("user:").user_id(), None);
    }

    #[test]
    fn test_has_role_is_exact() {
        let mut c = claims("1");
        c.roles = vec!["admin".to_string()];
        assert!(c.has_role("admin"));
        assert!(!c.has_role("adm"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut c = claims("1");
        assert_eq!(c.display_name(), "Ada Lovelace");

        c.name = Some("   ".to_string());
        assert_eq!(c.display_name(), "ada@example.com");

        c.name = None;
        assert_eq!(c.display_name(), "ada@example.com");
    }

    #[test]
    fn test_debug_redacts_identifiers() {
        let debug_str = format!("{:?}", claims("user:42"));
        assert!(!debug_str.contains("user:42"));
        assert!(!debug_str.contains("ada@example.com"));
        assert!(!debug_str.contains("Lovelace"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_roles_default_to_empty() {
        let json = r#"{"sub":"user:1","email":"a@b.c","iat":1,"exp":2}"#;
        let c: SessionClaims = serde_json::from_str(json).unwrap();
        assert!(c.roles.is_empty());
        assert!(c.name.is_none());
    }

    #[test]
    fn test_decode_raw_key_pem() {
        let raw = [7u8; 32];
        let pem = format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----",
            STANDARD.encode(raw)
        );
        assert_eq!(decode_ed25519_public_key_pem(&pem).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_decode_spki_pem() {
        let mut der = ED25519_SPKI_PREFIX.to_vec();
        der.extend_from_slice(&[9u8; 32]);
        let pem = format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
            STANDARD.encode(&der)
        );
        assert_eq!(decode_ed25519_public_key_pem(&pem).unwrap(), vec![9u8; 32]);
    }

    #[test]
    fn test_decode_rejects_wrong_length_and_bad_base64() {
        let pem = "-----BEGIN PUBLIC KEY-----\ndGVzdA==\n-----END PUBLIC KEY-----";
        assert_eq!(
            decode_ed25519_public_key_pem(pem),
            Err(KeyDecodeError::Length(4))
        );

        let bad = "-----BEGIN PUBLIC KEY-----\n!!!\n-----END PUBLIC KEY-----";
        assert!(matches!(
            decode_ed25519_public_key_pem(bad),
            Err(KeyDecodeError::Base64(_))
        ));
    }
}
