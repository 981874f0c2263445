//! Meeting access models.
//!
//! Registry records, denial reasons, and the JSON shapes of the HTTP API.
//! API bodies use camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Meeting status enumeration.
///
/// Only `scheduled -> active` is performed by this service (on first join).
/// The kill switch may additionally force `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl MeetingStatus {
    /// Returns the string stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Active => "active",
            MeetingStatus::Ended => "ended",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(MeetingStatus::Scheduled),
            "active" => Some(MeetingStatus::Active),
            "ended" => Some(MeetingStatus::Ended),
            "cancelled" => Some(MeetingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Timestamp column stamped by a conditional status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    StartedAt,
    /// Not stamped by any join path; available to registry callers that end meetings.
    EndedAt,
}

impl TimestampField {
    pub fn column(&self) -> &'static str {
        match self {
            TimestampField::StartedAt => "started_at",
            TimestampField::EndedAt => "ended_at",
        }
    }
}

/// A meeting as stored in the room registry.
///
/// `room_name` has the form `<tenant>/<slug>` and never changes after
/// creation. `is_active` is the kill switch and is independent of `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: i64,
    pub room_name: String,
    pub title: String,
    pub created_by: i64,
    pub allow_guests: bool,
    pub is_active: bool,
    pub status: MeetingStatus,
    /// Advisory only; joins are never refused for capacity.
    pub max_participants: Option<i32>,
    pub recording_enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a single join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub meeting_id: i64,
    /// `None` for guests.
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub is_moderator: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
}

/// Insert payload for [`Participant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub meeting_id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub is_moderator: bool,
}

/// Why a join request was refused.
///
/// Each reason maps to a distinct status code and error code at the HTTP
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingGuestName,
    MissingRoom,
    MeetingNotFound,
    GuestsNotAllowed,
    MeetingDisabled,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::MissingGuestName => "MISSING_GUEST_NAME",
            DenyReason::MissingRoom => "MISSING_ROOM",
            DenyReason::MeetingNotFound => "MEETING_NOT_FOUND",
            DenyReason::GuestsNotAllowed => "GUESTS_NOT_ALLOWED",
            DenyReason::MeetingDisabled => "MEETING_DISABLED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::MissingGuestName => "Guest name is required for unauthenticated users",
            DenyReason::MissingRoom => "Room name is required for guest join",
            DenyReason::MeetingNotFound => "Meeting not found",
            DenyReason::GuestsNotAllowed => "This meeting requires authentication",
            DenyReason::MeetingDisabled => "This meeting has been disabled",
        }
    }

    /// Label used for the denial metric.
    pub fn as_label(&self) -> &'static str {
        match self {
            DenyReason::MissingGuestName => "missing_guest_name",
            DenyReason::MissingRoom => "missing_room",
            DenyReason::MeetingNotFound => "meeting_not_found",
            DenyReason::GuestsNotAllowed => "guests_not_allowed",
            DenyReason::MeetingDisabled => "meeting_disabled",
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Readiness check response returned by `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    /// Generic message, no infrastructure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Token API
// ============================================================================

/// Body of `POST /api/v1/tokens`.
///
/// Every field is optional at the wire level; which ones are required
/// depends on whether the caller is authenticated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub room_name: Option<String>,

    #[serde(default)]
    pub is_moderator: Option<bool>,

    #[serde(default)]
    pub guest_name: Option<String>,
}

/// Issued capability token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,

    /// Seconds until the token expires.
    pub expires_in: i64,

    /// Room claim carried in the token (`*` when unscoped).
    pub room: String,
}

// ============================================================================
// Meeting API
// ============================================================================

/// Body of `POST /api/v1/meetings/lookup`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLookupRequest {
    #[serde(default)]
    pub room_name: Option<String>,
}

/// Public view of a meeting, safe to show before the caller joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub id: i64,
    pub title: String,
    pub room_name: String,
    pub allow_guests: bool,
    pub is_active: bool,
}

impl From<&Meeting> for MeetingSummary {
    fn from(meeting: &Meeting) -> Self {
        Self {
            id: meeting.id,
            title: meeting.title.clone(),
            room_name: meeting.room_name.clone(),
            allow_guests: meeting.allow_guests,
            is_active: meeting.is_active,
        }
    }
}

/// Response of `GET /api/v1/meetings/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingDetailResponse {
    pub meeting: Meeting,
    pub participants: Vec<Participant>,
}

/// Body of `POST /api/v1/meetings/:id/join`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeetingRequest {
    #[serde(default)]
    pub is_moderator: Option<bool>,
}

/// Response of `POST /api/v1/meetings/:id/join`.
#[derive(Debug, Clone, Serialize)]
pub struct JoinMeetingResponse {
    pub participant: Participant,
    pub meeting: Meeting,
}

/// Body of `PATCH /api/v1/meetings/:id/kill-switch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KillSwitchRequest {
    pub disable: bool,
}
