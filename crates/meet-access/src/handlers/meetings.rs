//! Meeting handlers.
//!
//! - `POST /api/v1/meetings/lookup` - Public summary by room name
//! - `GET /api/v1/meetings/{id}` - Meeting with participant records (authenticated)
//! - `POST /api/v1/meetings/{id}/join` - Record a join (authenticated)
//! - `PATCH /api/v1/meetings/{id}/kill-switch` - Disable or re-enable (creator or admin)

use crate::errors::MeetError;
use crate::handlers::{parse_json_body, parse_optional_json_body};
use crate::models::{
    DenyReason, JoinMeetingRequest, JoinMeetingResponse, KillSwitchRequest, Meeting,
    MeetingDetailResponse, MeetingSummary, RoomLookupRequest,
};
use crate::routes::AppState;
use crate::services::lifecycle::{self, JoinIdentity};
use crate::services::room_codec::canonicalize;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use common::jwt::SessionClaims;
use std::sync::Arc;
use tracing::instrument;

/// Role allowed to toggle the kill switch on any meeting.
const ADMIN_ROLE: &str = "admin";

/// Handler for POST /api/v1/meetings/lookup
///
/// Bare slugs are prefixed with the deployment tenant; names that already
/// contain `/` are looked up unchanged.
///
/// # Response
///
/// - 200 OK: [`MeetingSummary`]
/// - 400 Bad Request: missing or blank room name
/// - 404 Not Found: no such room
#[instrument(skip_all, name = "meet.meeting.lookup", fields(method = "POST", endpoint = "/api/v1/meetings/lookup"))]
pub async fn lookup_meeting(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<MeetingSummary>, MeetError> {
    let request: RoomLookupRequest = parse_optional_json_body(&body)?;

    let room_ref = request
        .room_name
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| MeetError::BadRequest("Room name is required".to_string()))?;

    let room_name = if room_ref.contains('/') {
        room_ref.to_string()
    } else {
        let tenant = state.issuer.tenant().ok_or_else(|| {
            MeetError::Configuration("app id not configured for room lookup".to_string())
        })?;
        canonicalize(room_ref, tenant)
    };

    let meeting = state
        .registry
        .find_by_room_name(&room_name)
        .await?
        .ok_or_else(|| MeetError::Denied(DenyReason::MeetingNotFound))?;

    Ok(Json(MeetingSummary::from(&meeting)))
}

/// Handler for GET /api/v1/meetings/{id}
#[instrument(skip_all, name = "meet.meeting.get", fields(method = "GET", endpoint = "/api/v1/meetings/{id}"))]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<SessionClaims>,
    Path(id): Path<String>,
) -> Result<Json<MeetingDetailResponse>, MeetError> {
    let meeting = load_meeting(&state, &id).await?;
    let participants = state.registry.list_participants(meeting.id).await?;

    Ok(Json(MeetingDetailResponse {
        meeting,
        participants,
    }))
}

/// Handler for POST /api/v1/meetings/{id}/join
///
/// Appends a participant record for the authenticated user. The creator is
/// always recorded as moderator.
///
/// # Response
///
/// - 200 OK: `{participant, meeting}` with the meeting as stored after the join
/// - 403 Forbidden: meeting disabled
/// - 404 Not Found: unknown meeting
#[instrument(skip_all, name = "meet.meeting.join", fields(method = "POST", endpoint = "/api/v1/meetings/{id}/join"))]
pub async fn join_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<String>,
    body: axum::body::Bytes,
) -> Result<Json<JoinMeetingResponse>, MeetError> {
    let request: JoinMeetingRequest = parse_optional_json_body(&body)?;
    let user_id = session_user_id(&claims)?;

    let meeting = load_meeting(&state, &id).await?;
    if !meeting.is_active {
        return Err(MeetError::Denied(DenyReason::MeetingDisabled));
    }

    let is_moderator = request.is_moderator.unwrap_or(false) || meeting.created_by == user_id;
    let recorded = lifecycle::record_join(
        state.registry.as_ref(),
        meeting.id,
        JoinIdentity {
            user_id: Some(user_id),
            name: claims.display_name(),
            email: claims.email.clone(),
            is_moderator,
        },
    )
    .await?;

    let meeting = state
        .registry
        .find_by_id(meeting.id)
        .await?
        .ok_or_else(|| MeetError::NotFound("Meeting not found".to_string()))?;

    Ok(Json(JoinMeetingResponse {
        participant: recorded.participant,
        meeting,
    }))
}

/// Handler for PATCH /api/v1/meetings/{id}/kill-switch
///
/// # Authorization
///
/// Only the meeting creator or a caller with the `admin` role.
///
/// # Response
///
/// - 200 OK: the updated meeting
/// - 400 Bad Request: body missing `disable`
/// - 403 Forbidden: caller is neither creator nor admin
/// - 404 Not Found: unknown meeting
#[instrument(skip_all, name = "meet.meeting.kill_switch", fields(method = "PATCH", endpoint = "/api/v1/meetings/{id}/kill-switch"))]
pub async fn toggle_kill_switch(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<String>,
    body: axum::body::Bytes,
) -> Result<Json<Meeting>, MeetError> {
    let request: KillSwitchRequest = parse_json_body(&body)?;
    let user_id = session_user_id(&claims)?;

    let meeting = load_meeting(&state, &id).await?;
    if meeting.created_by != user_id && !claims.has_role(ADMIN_ROLE) {
        tracing::warn!(
            target: "meet.handlers.meetings",
            meeting_id = meeting.id,
            "Kill switch refused: caller is not creator or admin"
        );
        return Err(MeetError::Forbidden(
            "Only the meeting creator or an admin can change the kill switch".to_string(),
        ));
    }

    let updated =
        lifecycle::apply_kill_switch(state.registry.as_ref(), meeting.id, request.disable).await?;

    Ok(Json(updated))
}

async fn load_meeting(state: &AppState, raw_id: &str) -> Result<Meeting, MeetError> {
    let id = parse_meeting_id(raw_id)?;
    state
        .registry
        .find_by_id(id)
        .await?
        .ok_or_else(|| MeetError::NotFound("Meeting not found".to_string()))
}

fn parse_meeting_id(raw: &str) -> Result<i64, MeetError> {
    raw.parse::<i64>()
        .map_err(|_| MeetError::BadRequest("Invalid meeting id".to_string()))
}

fn session_user_id(claims: &SessionClaims) -> Result<i64, MeetError> {
    claims.user_id().ok_or_else(|| {
        tracing::debug!(target: "meet.handlers.meetings", "Session subject is not a user id");
        MeetError::InvalidToken("Invalid user identifier in token".to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meeting_id() {
        assert_eq!(parse_meeting_id("42").unwrap(), 42);
        assert!(matches!(
            parse_meeting_id("abc"),
            Err(MeetError::BadRequest(_))
        ));
        assert!(parse_meeting_id("").is_err());
    }

    #[test]
    fn test_session_user_id() {
        let claims = SessionClaims {
            sub: "user:5".to_string(),
            email: "a@example.com".to_string(),
            name: None,
            roles: vec![],
            iat: 0,
            exp: 0,
        };
        assert_eq!(session_user_id(&claims).unwrap(), 5);
    }
}
