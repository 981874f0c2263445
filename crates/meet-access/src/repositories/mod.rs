//! Room registry gateway.
//!
//! The registry is the single source of truth for meetings and participant
//! records. Services depend on the [`MeetingRegistry`] trait only; the
//! Postgres implementation backs production and the in-memory one backs
//! tests and the local harness.
//!
//! Status and kill switch changes are single conditional statements so
//! concurrent requests never observe a torn update.

pub mod meetings;
pub mod memory;

use crate::errors::MeetError;
use crate::models::{Meeting, MeetingStatus, NewParticipant, Participant, TimestampField};

pub use meetings::PgMeetingsRepository;
pub use memory::{InMemoryMeetingRegistry, MeetingSeed};

/// Persistence operations required by the access-control services.
#[async_trait::async_trait]
pub trait MeetingRegistry: Send + Sync {
    /// Look up a meeting by its canonical `<tenant>/<slug>` name.
    async fn find_by_room_name(&self, room_name: &str) -> Result<Option<Meeting>, MeetError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Meeting>, MeetError>;

    /// Append a participant record. Never updates an existing record.
    async fn insert_participant(&self, participant: NewParticipant)
        -> Result<Participant, MeetError>;

    /// Participant records for a meeting, oldest first.
    async fn list_participants(&self, meeting_id: i64) -> Result<Vec<Participant>, MeetError>;

    /// Atomically move `id` from `from` to `to`, stamping `timestamp` with
    /// the current time. Returns `false` when the meeting was not in `from`
    /// (including when it does not exist).
    async fn conditional_transition(
        &self,
        id: i64,
        from: MeetingStatus,
        to: MeetingStatus,
        timestamp: TimestampField,
    ) -> Result<bool, MeetError>;

    /// Set the kill switch flag and optionally force a status in the same
    /// update. Returns the updated meeting, or `None` if it does not exist.
    async fn set_active(
        &self,
        id: i64,
        active: bool,
        status_override: Option<MeetingStatus>,
    ) -> Result<Option<Meeting>, MeetError>;

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), MeetError>;
}
