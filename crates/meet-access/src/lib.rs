//! Meeting Access Service Library
//!
//! Decides whether a caller may join a meeting room and at what privilege
//! level, and mints the signed capability tokens the conferencing backend
//! trusts.
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Session token verification
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Session authentication and HTTP metrics
//! - `models` - Registry records and API shapes
//! - `observability` - Prometheus metrics
//! - `repositories` - Room registry (Postgres and in-memory)
//! - `routes` - Axum router setup
//! - `services` - Room codec, eligibility, token issuer, lifecycle

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
