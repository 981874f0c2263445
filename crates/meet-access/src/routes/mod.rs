//! HTTP routes for the meeting access service.
//!
//! Defines the Axum router and application state.

use crate::auth::SessionVerifier;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, optional_user_auth, require_user_auth, AuthState,
};
use crate::repositories::MeetingRegistry;
use crate::services::token_issuer::TokenIssuer;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Room registry (Postgres in production, in-memory in tests).
    pub registry: Arc<dyn MeetingRegistry>,

    /// Service configuration.
    pub config: Config,

    /// Capability token issuer built from `config.signing`.
    pub issuer: Arc<TokenIssuer>,
}

/// Build the application routes.
///
/// - `/health`, `/ready`, `/metrics` - public, unversioned
/// - `POST /api/v1/meetings/lookup` - public
/// - `POST /api/v1/tokens` - optional session (guests allowed)
/// - `GET /api/v1/meetings/:id` - session required
/// - `POST /api/v1/meetings/:id/join` - session required
/// - `PATCH /api/v1/meetings/:id/kill-switch` - session required
///
/// Every request gets a trace span, a 30 second timeout, and HTTP metrics.
pub fn build_routes(
    state: Arc<AppState>,
    verifier: Arc<SessionVerifier>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let auth_state = Arc::new(AuthState { verifier });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/v1/meetings/lookup", post(handlers::lookup_meeting))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Guests and users share this endpoint; an invalid token is still a 401.
    let token_routes = Router::new()
        .route("/api/v1/tokens", post(handlers::issue_token))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            optional_user_auth,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/v1/meetings/:id", get(handlers::get_meeting))
        .route("/api/v1/meetings/:id/join", post(handlers::join_meeting))
        .route(
            "/api/v1/meetings/:id/kill-switch",
            patch(handlers::toggle_kill_switch),
        )
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            require_user_auth,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees framework rejections too)
    public_routes
        .merge(metrics_routes)
        .merge(token_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
