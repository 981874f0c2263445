//! Eligibility resolver.
//!
//! Decides whether a caller may join a room and at what privilege level.
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Guest without a display name
//! 2. Guest without a room
//! 3. Authenticated caller without a room gets an unscoped grant
//! 4. Registry lookup: existence, then guest policy, then the kill switch
//! 5. Moderator decision
//!
//! The registry is read on every call; `is_active` is never cached.

use crate::errors::MeetError;
use crate::models::{DenyReason, Meeting};
use crate::repositories::MeetingRegistry;
use crate::services::room_codec::canonicalize;
use tracing::instrument;

/// Identity of an authenticated caller, taken from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedJoin {
    pub identity: UserIdentity,
    pub request_moderator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestJoin {
    /// Raw display name as supplied; may be blank.
    pub display_name: String,
}

/// Who is asking to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinCaller {
    Authenticated(AuthenticatedJoin),
    Guest(GuestJoin),
}

impl JoinCaller {
    /// Metric label for the caller kind.
    pub fn kind(&self) -> &'static str {
        match self {
            JoinCaller::Authenticated(_) => "authenticated",
            JoinCaller::Guest(_) => "guest",
        }
    }
}

/// Successful eligibility decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub moderator: bool,
    /// The meeting the grant is scoped to, `None` for an unscoped grant.
    pub meeting: Option<Meeting>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Allow(Grant),
    Deny(DenyReason),
}

/// Resolve a join request against the registry.
///
/// `tenant` is the prefix applied to bare room slugs before lookup.
///
/// # Errors
///
/// Only registry failures are errors; refusals are `Eligibility::Deny`.
#[instrument(skip_all, name = "meet.eligibility.resolve", fields(caller = caller.kind()))]
pub async fn resolve(
    registry: &dyn MeetingRegistry,
    tenant: &str,
    caller: &JoinCaller,
    room_ref: &str,
) -> Result<Eligibility, MeetError> {
    let room_ref = room_ref.trim();

    if let JoinCaller::Guest(guest) = caller {
        if guest.display_name.trim().is_empty() {
            return Ok(Eligibility::Deny(DenyReason::MissingGuestName));
        }
        if room_ref.is_empty() {
            return Ok(Eligibility::Deny(DenyReason::MissingRoom));
        }
    }

    if let JoinCaller::Authenticated(auth) = caller {
        if room_ref.is_empty() {
            return Ok(Eligibility::Allow(Grant {
                moderator: auth.request_moderator,
                meeting: None,
            }));
        }
    }

    let room_name = canonicalize(room_ref, tenant);
    let Some(meeting) = registry.find_by_room_name(&room_name).await? else {
        return Ok(Eligibility::Deny(DenyReason::MeetingNotFound));
    };

    if matches!(caller, JoinCaller::Guest(_)) && !meeting.allow_guests {
        return Ok(Eligibility::Deny(DenyReason::GuestsNotAllowed));
    }

    if !meeting.is_active {
        return Ok(Eligibility::Deny(DenyReason::MeetingDisabled));
    }

    let moderator = match caller {
        JoinCaller::Authenticated(auth) => {
            auth.request_moderator || auth.identity.user_id == meeting.created_by
        }
        JoinCaller::Guest(_) => false,
    };

    tracing::debug!(
        target: "meet.eligibility",
        meeting_id = meeting.id,
        moderator,
        "Join allowed"
    );

    Ok(Eligibility::Allow(Grant {
        moderator,
        meeting: Some(meeting),
    }))
}
