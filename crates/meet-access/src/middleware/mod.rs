//! HTTP middleware for the meeting access service.
//!
//! # Components
//!
//! - `auth` - Session authentication (required and optional)
//! - `http_metrics` - HTTP request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::{optional_user_auth, require_user_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
