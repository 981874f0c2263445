//! Meeting lifecycle tracker.
//!
//! Records joins and drives the only status change this service performs on
//! its own (`scheduled -> active` on first join). The kill switch is applied
//! here as well.

use crate::errors::MeetError;
use crate::models::{Meeting, MeetingStatus, NewParticipant, Participant, TimestampField};
use crate::observability::metrics;
use crate::repositories::MeetingRegistry;
use tracing::instrument;

/// Identity written to the participant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinIdentity {
    /// `None` for guests.
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub is_moderator: bool,
}

impl JoinIdentity {
    fn caller_kind(&self) -> &'static str {
        if self.user_id.is_some() {
            "authenticated"
        } else {
            "guest"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinRecorded {
    pub participant: Participant,
    /// True only for the join that moved the meeting out of `scheduled`.
    pub started_meeting: bool,
}

/// Append a participant record, then start the meeting if it is still
/// scheduled.
///
/// Capacity is not checked. Losing the start race to a concurrent join is
/// not an error.
///
/// # Errors
///
/// Registry failures. A failure after the insert leaves the participant
/// record in place.
#[instrument(skip_all, name = "meet.lifecycle.record_join", fields(meeting_id = meeting_id))]
pub async fn record_join(
    registry: &dyn MeetingRegistry,
    meeting_id: i64,
    identity: JoinIdentity,
) -> Result<JoinRecorded, MeetError> {
    let caller = identity.caller_kind();

    let participant = registry
        .insert_participant(NewParticipant {
            meeting_id,
            user_id: identity.user_id,
            name: identity.name,
            email: identity.email,
            is_moderator: identity.is_moderator,
        })
        .await?;

    let started_meeting = registry
        .conditional_transition(
            meeting_id,
            MeetingStatus::Scheduled,
            MeetingStatus::Active,
            TimestampField::StartedAt,
        )
        .await?;

    if started_meeting {
        tracing::info!(target: "meet.lifecycle", meeting_id, "Meeting started by first join");
    }
    metrics::record_join(caller, started_meeting);

    Ok(JoinRecorded {
        participant,
        started_meeting,
    })
}

/// Disable (`is_active = false`, `status = cancelled`) or re-enable
/// (`is_active = true`, status untouched) a meeting.
///
/// Disabling does not evict participants who are already connected; it only
/// stops new tokens from being issued for the room.
///
/// # Errors
///
/// `NotFound` for an unknown meeting, otherwise registry failures.
#[instrument(skip_all, name = "meet.lifecycle.kill_switch", fields(meeting_id = meeting_id, disable = disable))]
pub async fn apply_kill_switch(
    registry: &dyn MeetingRegistry,
    meeting_id: i64,
    disable: bool,
) -> Result<Meeting, MeetError> {
    let status_override = disable.then_some(MeetingStatus::Cancelled);

    let meeting = registry
        .set_active(meeting_id, !disable, status_override)
        .await?
        .ok_or_else(|| MeetError::NotFound("Meeting not found".to_string()))?;

    let action = if disable { "disable" } else { "enable" };
    metrics::record_kill_switch(action);
    tracing::info!(
        target: "meet.lifecycle",
        meeting_id,
        action,
        status = meeting.status.as_str(),
        "Kill switch applied"
    );

    Ok(meeting)
}
