//! Capability token handler.
//!
//! `POST /api/v1/tokens` serves both authenticated users and guests. The
//! route runs behind `optional_user_auth`: a verified session makes the
//! caller a user, no Authorization header makes them a guest.
//!
//! Flow: signing config check, eligibility, sign, then record the join when
//! the grant names a meeting.

use crate::errors::MeetError;
use crate::handlers::parse_optional_json_body;
use crate::models::{TokenRequest, TokenResponse};
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::eligibility::{
    self, AuthenticatedJoin, Eligibility, GuestJoin, JoinCaller, UserIdentity,
};
use crate::services::lifecycle::{self, JoinIdentity};
use crate::services::room_codec::token_room_scope;
use crate::services::token_issuer::TokenIdentity;
use axum::{
    extract::State,
    http::{header::HOST, HeaderMap},
    Extension, Json,
};
use common::jwt::SessionClaims;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/tokens
///
/// # Response
///
/// - 200 OK: `{token, expiresIn, room}`
/// - 400 Bad Request: guest without a name or room, malformed body
/// - 401 Unauthorized: session token present but invalid
/// - 403 Forbidden: guests not allowed, or meeting disabled
/// - 404 Not Found: unknown room
/// - 500 Internal Server Error: signing not configured, signing or registry failure
#[instrument(
    skip_all,
    name = "meet.token.request",
    fields(method = "POST", endpoint = "/api/v1/tokens", caller = tracing::field::Empty)
)]
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    session: Option<Extension<SessionClaims>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<TokenResponse>, MeetError> {
    let request: TokenRequest = parse_optional_json_body(&body)?;

    // Fail before touching the registry if tokens cannot be signed anyway.
    state.issuer.ensure_configured()?;
    let tenant = state
        .issuer
        .tenant()
        .ok_or_else(|| MeetError::Configuration("SigningKeyMissing: app id".to_string()))?;

    let caller = build_caller(session.as_ref().map(|Extension(claims)| claims), &request)?;
    tracing::Span::current().record("caller", caller.kind());

    let room_ref = request.room_name.as_deref().unwrap_or_default();
    let grant = match eligibility::resolve(state.registry.as_ref(), tenant, &caller, room_ref)
        .await?
    {
        Eligibility::Allow(grant) => grant,
        Eligibility::Deny(reason) => {
            metrics::record_eligibility_denial(reason.as_label(), caller.kind());
            tracing::info!(
                target: "meet.handlers.tokens",
                reason = reason.as_label(),
                caller = caller.kind(),
                "Token request denied"
            );
            return Err(MeetError::Denied(reason));
        }
    };

    let identity = match &caller {
        JoinCaller::Authenticated(auth) => TokenIdentity::new(
            auth.identity.name.clone(),
            auth.identity.email.clone(),
            grant.moderator,
        ),
        JoinCaller::Guest(guest) => {
            let name = guest.display_name.trim();
            let host = guest_email_host(&headers, &state.config.guest_email_domain);
            TokenIdentity::new(name, guest_email(name, &host), false)
        }
    };

    let issued = state
        .issuer
        .issue(&identity, &token_room_scope(room_ref.trim()))?;

    if let Some(meeting) = &grant.meeting {
        let user_id = match &caller {
            JoinCaller::Authenticated(auth) => Some(auth.identity.user_id),
            JoinCaller::Guest(_) => None,
        };
        lifecycle::record_join(
            state.registry.as_ref(),
            meeting.id,
            JoinIdentity {
                user_id,
                name: identity.name.clone(),
                email: identity.email.clone(),
                is_moderator: identity.moderator,
            },
        )
        .await?;
    }

    Ok(Json(TokenResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        room: issued.room,
    }))
}

/// Turn the verified session (if any) and request body into a tagged caller.
fn build_caller(
    session: Option<&SessionClaims>,
    request: &TokenRequest,
) -> Result<JoinCaller, MeetError> {
    match session {
        Some(claims) => {
            let user_id = claims.user_id().ok_or_else(|| {
                tracing::debug!(target: "meet.handlers.tokens", "Session subject is not a user id");
                MeetError::InvalidToken("Invalid user identifier in token".to_string())
            })?;
            Ok(JoinCaller::Authenticated(AuthenticatedJoin {
                identity: UserIdentity {
                    user_id,
                    name: claims.display_name(),
                    email: claims.email.clone(),
                },
                request_moderator: request.is_moderator.unwrap_or(false),
            }))
        }
        None => Ok(JoinCaller::Guest(GuestJoin {
            display_name: request.guest_name.clone().unwrap_or_default(),
        })),
    }
}

fn guest_email_host(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Synthesize a guest email: lowercased name, whitespace runs replaced by
/// `.`, at `host`.
fn guest_email(name: &str, host: &str) -> String {
    let local = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".");
    format!("{local}@{host}")
}
