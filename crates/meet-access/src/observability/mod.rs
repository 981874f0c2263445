//! Observability for the meeting access service.
//!
//! Prometheus metrics definitions; HTTP request metrics are recorded by
//! `middleware::http_metrics`.

pub mod metrics;
