//! Session authentication middleware.
//!
//! Provides two middleware functions:
//! - `require_user_auth` - the caller must present a valid session token
//! - `optional_user_auth` - a missing token means a guest; a present but
//!   invalid one is still rejected
//!
//! Verified [`SessionClaims`] are inserted into request extensions.

use crate::auth::SessionVerifier;
use crate::errors::MeetError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::SessionClaims;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<SessionVerifier>,
}

/// Bearer token from the Authorization header.
///
/// `Ok(None)` when the header is absent, an error when it is present but
/// not a bearer credential.
fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, MeetError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| {
        tracing::debug!(target: "meet.middleware.auth", "Non-ASCII Authorization header");
        MeetError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    value.strip_prefix("Bearer ").map(Some).ok_or_else(|| {
        tracing::debug!(target: "meet.middleware.auth", "Invalid Authorization header format");
        MeetError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

fn verify_request(state: &AuthState, req: &Request) -> Result<Option<SessionClaims>, MeetError> {
    extract_bearer_token(req.headers())?
        .map(|token| state.verifier.verify(token))
        .transpose()
}

/// Reject the request with 401 unless it carries a valid session token.
#[instrument(skip_all, name = "meet.middleware.user_auth")]
pub async fn require_user_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, MeetError> {
    let claims = verify_request(&state, &req)?.ok_or_else(|| {
        tracing::debug!(target: "meet.middleware.auth", "Missing Authorization header");
        MeetError::InvalidToken("Missing Authorization header".to_string())
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Attach session claims when a token is presented; otherwise continue as a
/// guest.
#[instrument(skip_all, name = "meet.middleware.optional_user_auth")]
pub async fn optional_user_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, MeetError> {
    if let Some(claims) = verify_request(&state, &req)? {
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}
