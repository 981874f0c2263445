//! Capability token issuer.
//!
//! Mints RS256 JWTs in the claim layout expected by the conferencing
//! backend. Tokens are never persisted; their lifetime is the only
//! revocation mechanism.
//!
//! Signing material comes from [`SigningConfig`] at construction. A
//! malformed key is rejected at startup; a missing key, key id, or app id
//! only fails at issue time so the rest of the service keeps running.

use crate::config::{ConfigError, SigningConfig};
use crate::errors::MeetError;
use crate::observability::metrics;
use crate::services::room_codec::WILDCARD_ROOM;
use chrono::Utc;
use common::secret::ExposeSecret;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Fixed audience understood by the conferencing backend.
pub const TOKEN_AUDIENCE: &str = "jitsi";

/// Fixed issuer understood by the conferencing backend.
pub const TOKEN_ISSUER: &str = "chat";

/// Claims of a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// App id of this deployment.
    pub sub: String,
    /// Room slug, or `*` for any room.
    pub room: String,
    pub context: TokenContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContext {
    pub user: TokenUser,
    pub features: TokenFeatures,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    /// Fresh random id per token, unrelated to any registry id.
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    /// `"true"` or `"false"`; the backend expects a string.
    pub moderator: String,
    #[serde(
        rename = "hidden-from-recorder",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hidden_from_recorder: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFeatures {
    pub livestreaming: bool,
    pub recording: bool,
    pub transcription: bool,
    #[serde(rename = "list-visitors")]
    pub list_visitors: bool,
    #[serde(rename = "file-upload")]
    pub file_upload: bool,
    #[serde(rename = "outbound-call")]
    pub outbound_call: bool,
    #[serde(rename = "sip-outbound-call")]
    pub sip_outbound_call: bool,
    #[serde(rename = "inbound-call")]
    pub inbound_call: bool,
    #[serde(rename = "sip-inbound-call")]
    pub sip_inbound_call: bool,
}

/// Who the token is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub moderator: bool,
    pub hidden_from_recorder: Option<bool>,
}

impl TokenIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, moderator: bool) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            avatar: None,
            moderator,
            hidden_from_recorder: None,
        }
    }
}

/// A signed capability token.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub room: String,
    pub expires_in: i64,
    pub expires_at: i64,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("room", &self.room)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Signs capability tokens with the configured RSA key.
pub struct TokenIssuer {
    signing: SigningConfig,
    encoding_key: Option<EncodingKey>,
    rng: SystemRandom,
}

impl TokenIssuer {
    /// Build an issuer, parsing the private key if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSigningKey` if the key is not a valid
    /// RSA PEM.
    pub fn new(signing: SigningConfig) -> Result<Self, ConfigError> {
        let encoding_key = match &signing.private_key_pem {
            Some(pem) => Some(
                EncodingKey::from_rsa_pem(pem.expose_secret().as_bytes())
                    .map_err(|e| ConfigError::InvalidSigningKey(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            signing,
            encoding_key,
            rng: SystemRandom::new(),
        })
    }

    /// App id, which doubles as the tenant prefix for room names.
    pub fn tenant(&self) -> Option<&str> {
        self.signing.app_id.as_deref()
    }

    /// Fail fast when any signing input is missing.
    ///
    /// # Errors
    ///
    /// Returns `MeetError::Configuration` naming the first missing input.
    pub fn ensure_configured(&self) -> Result<(), MeetError> {
        self.material().map(|_| ())
    }

    fn material(&self) -> Result<(&EncodingKey, &str, &str), MeetError> {
        let key = self.encoding_key.as_ref().ok_or_else(|| {
            MeetError::Configuration("SigningKeyMissing: private key not configured".to_string())
        })?;
        let key_id = self.signing.key_id.as_deref().ok_or_else(|| {
            MeetError::Configuration("SigningKeyMissing: key id not configured".to_string())
        })?;
        let app_id = self.signing.app_id.as_deref().ok_or_else(|| {
            MeetError::Configuration("SigningKeyMissing: app id not configured".to_string())
        })?;
        Ok((key, key_id, app_id))
    }

    /// Issue a token for `identity` scoped to `room_scope` (`""` means `*`).
    ///
    /// # Errors
    ///
    /// `Configuration` when signing inputs are missing, `SigningFailure` when
    /// the signature operation fails.
    pub fn issue(
        &self,
        identity: &TokenIdentity,
        room_scope: &str,
    ) -> Result<IssuedToken, MeetError> {
        self.issue_at(identity, room_scope, Utc::now().timestamp())
    }

    /// [`issue`](Self::issue) with an explicit issue time.
    #[instrument(skip_all, name = "meet.token.issue", fields(moderator = identity.moderator))]
    pub fn issue_at(
        &self,
        identity: &TokenIdentity,
        room_scope: &str,
        now: i64,
    ) -> Result<IssuedToken, MeetError> {
        let start = Instant::now();
        let result = self.sign(identity, room_scope, now);

        let outcome = match &result {
            Ok(_) => "success",
            Err(MeetError::Configuration(_)) => "configuration_error",
            Err(_) => "signing_error",
        };
        metrics::record_token_issuance(outcome, start.elapsed());

        result
    }

    fn sign(
        &self,
        identity: &TokenIdentity,
        room_scope: &str,
        now: i64,
    ) -> Result<IssuedToken, MeetError> {
        let (encoding_key, key_id, app_id) = self.material()?;

        let room = if room_scope.is_empty() {
            WILDCARD_ROOM.to_string()
        } else {
            room_scope.to_string()
        };

        let exp = now
            .checked_add(self.signing.token_validity_seconds)
            .ok_or_else(|| {
                MeetError::Configuration("token lifetime overflows expiry".to_string())
            })?;
        let nbf = now.checked_sub(self.signing.nbf_skew_seconds).ok_or_else(|| {
            MeetError::Configuration("nbf skew underflows not-before".to_string())
        })?;
        let claims = CapabilityClaims {
            aud: TOKEN_AUDIENCE.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            nbf,
            exp,
            sub: app_id.to_string(),
            room: room.clone(),
            context: TokenContext {
                user: TokenUser {
                    id: self.subject_id()?.to_string(),
                    name: identity.name.clone(),
                    email: identity.email.clone(),
                    avatar: identity.avatar.clone().unwrap_or_default(),
                    moderator: identity.moderator.to_string(),
                    hidden_from_recorder: identity.hidden_from_recorder,
                },
                features: self.features(identity.moderator),
            },
        };

        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(key_id.to_string());

        let token = encode(&header, &claims, encoding_key)
            .map_err(|e| MeetError::SigningFailure(format!("RS256 signing failed: {e}")))?;

        tracing::debug!(target: "meet.token", room = %room, exp, "Capability token issued");

        Ok(IssuedToken {
            token,
            room,
            expires_in: self.signing.token_validity_seconds,
            expires_at: exp,
        })
    }

    fn features(&self, moderator: bool) -> TokenFeatures {
        TokenFeatures {
            livestreaming: moderator,
            recording: moderator,
            transcription: moderator,
            list_visitors: moderator,
            file_upload: true,
            outbound_call: self.signing.outbound_calls,
            sip_outbound_call: self.signing.outbound_calls,
            inbound_call: self.signing.inbound_calls,
            sip_inbound_call: self.signing.inbound_calls,
        }
    }

    /// Random v4 UUID drawn from the system CSPRNG.
    fn subject_id(&self) -> Result<Uuid, MeetError> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| MeetError::Internal("system random source unavailable".to_string()))?;
        Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}
