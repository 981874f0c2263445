//! Meeting access service configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the token signing key are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default capability token lifetime (2 hours).
pub const DEFAULT_TOKEN_VALIDITY_SECONDS: i64 = 7200;

/// Upper bound on capability token lifetime (7 days).
pub const MAX_TOKEN_VALIDITY_SECONDS: i64 = 7 * 24 * 3600;

/// Upper bound on `nbf` backdating.
pub const MAX_TOKEN_NBF_SKEW_SECONDS: i64 = 600;

/// Default backdating of `nbf` to absorb clock drift at the conferencing backend.
pub const DEFAULT_TOKEN_NBF_SKEW_SECONDS: i64 = 5;

/// Fallback domain for synthesized guest emails when no Host header is present.
pub const DEFAULT_GUEST_EMAIL_DOMAIN: &str = "meet.example.com";

/// Default graceful shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Material and policy for minting capability tokens.
///
/// Key, key id, and app id are optional at startup so that the service can
/// still answer lookups and readiness probes; issuing fails with a
/// configuration error until they are provided.
#[derive(Clone)]
pub struct SigningConfig {
    /// RS256 private key in PEM (PKCS#1 or PKCS#8).
    pub private_key_pem: Option<SecretString>,

    /// Key id placed in the token header (`kid`).
    pub key_id: Option<String>,

    /// App id used as token subject and as the room-name tenant prefix.
    pub app_id: Option<String>,

    pub token_validity_seconds: i64,

    pub nbf_skew_seconds: i64,

    /// Operator override for `outbound-call` / `sip-outbound-call`.
    pub outbound_calls: bool,

    /// Operator override for `inbound-call` / `sip-inbound-call`.
    pub inbound_calls: bool,
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field(
                "private_key_pem",
                &self.private_key_pem.as_ref().map(|_| "[REDACTED]"),
            )
            .field("key_id", &self.key_id)
            .field("app_id", &self.app_id)
            .field("token_validity_seconds", &self.token_validity_seconds)
            .field("nbf_skew_seconds", &self.nbf_skew_seconds)
            .field("outbound_calls", &self.outbound_calls)
            .field("inbound_calls", &self.inbound_calls)
            .finish()
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            private_key_pem: None,
            key_id: None,
            app_id: None,
            token_validity_seconds: DEFAULT_TOKEN_VALIDITY_SECONDS,
            nbf_skew_seconds: DEFAULT_TOKEN_NBF_SKEW_SECONDS,
            outbound_calls: false,
            inbound_calls: false,
        }
    }
}

/// Meeting access service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Ed25519 public key (PEM) of the upstream identity provider.
    pub session_public_key_pem: String,

    /// Clock skew tolerance in seconds for session token `iat`.
    pub jwt_clock_skew_seconds: i64,

    pub signing: SigningConfig,

    pub guest_email_domain: String,

    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("signing", &self.signing)
            .field("guest_email_domain", &self.guest_email_domain)
            .field("drain_seconds", &self.drain_seconds)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid token lifetime configuration: {0}")]
    InvalidTokenLifetime(String),

    #[error("Invalid flag value: {0}")]
    InvalidFlag(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainPeriod(String),

    #[error("Invalid session public key: {0}")]
    InvalidSessionKey(String),

    #[error("Invalid signing key: {0}")]
    InvalidSigningKey(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let session_public_key_pem = non_empty(vars, "SESSION_PUBLIC_KEY")
            .map(unescape_newlines)
            .ok_or_else(|| ConfigError::MissingEnvVar("SESSION_PUBLIC_KEY".to_string()))?;

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let token_validity_seconds = parse_positive_seconds(
            vars,
            "TOKEN_VALIDITY_SECONDS",
            DEFAULT_TOKEN_VALIDITY_SECONDS,
        )?;
        if token_validity_seconds > MAX_TOKEN_VALIDITY_SECONDS {
            return Err(ConfigError::InvalidTokenLifetime(format!(
                "TOKEN_VALIDITY_SECONDS must not exceed {} seconds, got {}",
                MAX_TOKEN_VALIDITY_SECONDS, token_validity_seconds
            )));
        }

        let nbf_skew_seconds = match vars.get("TOKEN_NBF_SKEW_SECONDS") {
            Some(value_str) => {
                let value: i64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidTokenLifetime(format!(
                        "TOKEN_NBF_SKEW_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value < 0 {
                    return Err(ConfigError::InvalidTokenLifetime(format!(
                        "TOKEN_NBF_SKEW_SECONDS must not be negative, got {}",
                        value
                    )));
                }
                if value > MAX_TOKEN_NBF_SKEW_SECONDS {
                    return Err(ConfigError::InvalidTokenLifetime(format!(
                        "TOKEN_NBF_SKEW_SECONDS must not exceed {} seconds, got {}",
                        MAX_TOKEN_NBF_SKEW_SECONDS, value
                    )));
                }
                value
            }
            None => DEFAULT_TOKEN_NBF_SKEW_SECONDS,
        };

        let signing = SigningConfig {
            private_key_pem: non_empty(vars, "JITSI_PRIVATE_KEY")
                .map(unescape_newlines)
                .map(SecretString::from),
            key_id: non_empty(vars, "JITSI_API_KEY_ID"),
            app_id: non_empty(vars, "JITSI_APP_ID"),
            token_validity_seconds,
            nbf_skew_seconds,
            outbound_calls: parse_flag(vars, "JITSI_OUTBOUND_CALLS")?,
            inbound_calls: parse_flag(vars, "JITSI_INBOUND_CALLS")?,
        };

        let guest_email_domain = non_empty(vars, "GUEST_EMAIL_DOMAIN")
            .unwrap_or_else(|| DEFAULT_GUEST_EMAIL_DOMAIN.to_string());

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainPeriod(format!(
                    "DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            database_url,
            bind_address,
            session_public_key_pem,
            jwt_clock_skew_seconds,
            signing,
            guest_email_domain,
            drain_seconds,
        })
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Keys pasted into single-line env files carry literal `\n` sequences.
fn unescape_newlines(value: String) -> String {
    if value.contains("\\n") {
        value.replace("\\n", "\n")
    } else {
        value
    }
}

fn parse_flag(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            other => Err(ConfigError::InvalidFlag(format!(
                "{} must be true or false, got '{}'",
                key, other
            ))),
        },
    }
}

fn parse_positive_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTokenLifetime(format!(
            "{} must be a valid integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value <= 0 {
        return Err(ConfigError::InvalidTokenLifetime(format!(
            "{} must be positive, got {}",
            key, value
        )));
    }

    Ok(value)
}
