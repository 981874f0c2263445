//! Utilities shared between the meeting access service and its test harness.

#![warn(clippy::pedantic)]

/// Secret wrappers that keep signing keys and credentials out of logs
pub mod secret;

/// Session token helpers (size limits, clock skew, claims, key decoding)
pub mod jwt;
