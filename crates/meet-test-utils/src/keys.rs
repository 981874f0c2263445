//! Deterministic key material for tests.
//!
//! RSA keys are fixed PEM fixtures (RSA key generation is too slow to do
//! per test). Ed25519 session keys are derived from a one-byte seed.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use common::jwt::SessionClaims;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use meet_access::services::token_issuer::{CapabilityClaims, TOKEN_AUDIENCE, TOKEN_ISSUER};
use ring::signature::{Ed25519KeyPair, KeyPair};

/// RSA private key the harness signs capability tokens with.
pub const RSA_SIGNING_KEY_PEM: &str = include_str!("../fixtures/rsa_signing_key.pem");

/// Public half of [`RSA_SIGNING_KEY_PEM`].
pub const RSA_SIGNING_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/rsa_signing_key.pub.pem");

/// An unrelated RSA key, for signature mismatch tests.
pub const RSA_OTHER_KEY_PEM: &str = include_str!("../fixtures/rsa_other_key.pem");

pub const RSA_OTHER_PUBLIC_KEY_PEM: &str = include_str!("../fixtures/rsa_other_key.pub.pem");

pub const TEST_KEY_ID: &str = "test-app/kid-01";
pub const TEST_APP_ID: &str = "test-app";

/// Ed25519 keypair standing in for the upstream identity provider.
pub struct SessionKeypair {
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl SessionKeypair {
    pub fn new(seed: u8) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Public key in the PEM form `SESSION_PUBLIC_KEY` expects.
    pub fn public_key_pem(&self) -> String {
        format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
            STANDARD.encode(&self.public_key_bytes)
        )
    }

    pub fn sign(&self, claims: &SessionClaims) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some("idp-test-01".to_string());

        encode(&header, claims, &encoding_key).expect("Failed to sign session token")
    }

    /// A session token for `user:{user_id}`, valid for one hour.
    pub fn user_token(&self, user_id: i64, name: &str, email: &str) -> String {
        self.sign(&session_claims(user_id, name, email, &[], 3600))
    }

    pub fn admin_token(&self, user_id: i64, name: &str, email: &str) -> String {
        self.sign(&session_claims(user_id, name, email, &["admin"], 3600))
    }

    /// A session token that expired an hour ago.
    pub fn expired_token(&self, user_id: i64) -> String {
        self.sign(&session_claims(
            user_id,
            "Expired",
            "expired@example.com",
            &[],
            -3600,
        ))
    }
}

/// Session claims issued now and expiring `ttl_seconds` from now.
pub fn session_claims(
    user_id: i64,
    name: &str,
    email: &str,
    roles: &[&str],
    ttl_seconds: i64,
) -> SessionClaims {
    let now = Utc::now().timestamp();
    let iat = if ttl_seconds > 0 { now } else { now + ttl_seconds - 60 };
    SessionClaims {
        sub: format!("user:{user_id}"),
        email: email.to_string(),
        name: Some(name.to_string()),
        roles: roles.iter().map(ToString::to_string).collect(),
        iat,
        exp: now + ttl_seconds,
    }
}

fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();
    pkcs8.push(0x30);
    pkcs8.push(0x2e);
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    pkcs8.push(0x30);
    pkcs8.push(0x05);
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);
    pkcs8.push(0x04);
    pkcs8.push(0x22);
    pkcs8.push(0x04);
    pkcs8.push(0x20);
    pkcs8.extend_from_slice(seed);
    pkcs8
}

/// Verify a capability token against `public_key_pem` the way the
/// conferencing backend would (RS256, audience, issuer, exp, nbf).
pub fn decode_capability_token_with(
    token: &str,
    public_key_pem: &str,
) -> anyhow::Result<TokenData<CapabilityClaims>> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.validate_nbf = true;
    Ok(decode::<CapabilityClaims>(token, &key, &validation)?)
}

/// [`decode_capability_token_with`] using the harness signing key.
pub fn decode_capability_token(token: &str) -> anyhow::Result<TokenData<CapabilityClaims>> {
    decode_capability_token_with(token, RSA_SIGNING_PUBLIC_KEY_PEM)
}

/// Header of a capability token, without verifying it.
pub fn capability_token_header(token: &str) -> anyhow::Result<Header> {
    Ok(decode_header(token)?)
}
