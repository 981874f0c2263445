//! In-memory room registry.
//!
//! A mutex-guarded map with the same conditional-update semantics as the
//! Postgres registry. Backs unit tests, integration tests, and the
//! in-process server harness.

use crate::errors::MeetError;
use crate::models::{Meeting, MeetingStatus, NewParticipant, Participant, TimestampField};
use crate::repositories::MeetingRegistry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Seed data for a meeting inserted directly into the in-memory registry.
#[derive(Debug, Clone)]
pub struct MeetingSeed {
    pub room_name: String,
    pub title: String,
    pub created_by: i64,
    pub allow_guests: bool,
    pub is_active: bool,
    pub status: MeetingStatus,
    pub max_participants: Option<i32>,
    pub recording_enabled: bool,
}

impl MeetingSeed {
    /// A scheduled, active meeting that admits guests.
    pub fn new(room_name: impl Into<String>, created_by: i64) -> Self {
        let room_name = room_name.into();
        Self {
            title: format!("Meeting {room_name}"),
            room_name,
            created_by,
            allow_guests: true,
            is_active: true,
            status: MeetingStatus::Scheduled,
            max_participants: Some(50),
            recording_enabled: false,
        }
    }

    pub fn allow_guests(mut self, allow: bool) -> Self {
        self.allow_guests = allow;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn status(mut self, status: MeetingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn max_participants(mut self, max: Option<i32>) -> Self {
        self.max_participants = max;
        self
    }
}

#[derive(Default)]
struct RegistryState {
    meetings: HashMap<i64, Meeting>,
    participants: Vec<Participant>,
    next_meeting_id: i64,
    next_participant_id: i64,
}

/// Room registry held entirely in process memory.
#[derive(Default)]
pub struct InMemoryMeetingRegistry {
    state: Mutex<RegistryState>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryMeetingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a meeting and return the stored record.
    pub fn insert_meeting(&self, seed: MeetingSeed) -> Result<Meeting, MeetError> {
        let mut state = self.lock()?;
        state.next_meeting_id += 1;
        let now = Utc::now();
        let meeting = Meeting {
            id: state.next_meeting_id,
            room_name: seed.room_name,
            title: seed.title,
            created_by: seed.created_by,
            allow_guests: seed.allow_guests,
            is_active: seed.is_active,
            status: seed.status,
            max_participants: seed.max_participants,
            recording_enabled: seed.recording_enabled,
            started_at: None,
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        state.meetings.insert(meeting.id, meeting.clone());
        Ok(meeting)
    }

    /// Make every subsequent operation fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of meeting lookups (by room name or id) served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, MeetError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MeetError::Database("registry unavailable".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| MeetError::Internal("registry lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl MeetingRegistry for InMemoryMeetingRegistry {
    async fn find_by_room_name(&self, room_name: &str) -> Result<Option<Meeting>, MeetError> {
        let state = self.lock()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(state
            .meetings
            .values()
            .find(|m| m.room_name == room_name)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Meeting>, MeetError> {
        let state = self.lock()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(state.meetings.get(&id).cloned())
    }

    async fn insert_participant(
        &self,
        participant: NewParticipant,
    ) -> Result<Participant, MeetError> {
        let mut state = self.lock()?;
        if !state.meetings.contains_key(&participant.meeting_id) {
            return Err(MeetError::Database(format!(
                "foreign key violation: meeting {} does not exist",
                participant.meeting_id
            )));
        }
        state.next_participant_id += 1;
        let record = Participant {
            id: state.next_participant_id,
            meeting_id: participant.meeting_id,
            user_id: participant.user_id,
            name: participant.name,
            email: participant.email,
            is_moderator: participant.is_moderator,
            joined_at: Utc::now(),
            left_at: None,
            duration_seconds: None,
        };
        state.participants.push(record.clone());
        Ok(record)
    }

    async fn list_participants(&self, meeting_id: i64) -> Result<Vec<Participant>, MeetError> {
        let state = self.lock()?;
        Ok(state
            .participants
            .iter()
            .filter(|p| p.meeting_id == meeting_id)
            .cloned()
            .collect())
    }

    async fn conditional_transition(
        &self,
        id: i64,
        from: MeetingStatus,
        to: MeetingStatus,
        timestamp: TimestampField,
    ) -> Result<bool, MeetError> {
        let mut state = self.lock()?;
        let Some(meeting) = state.meetings.get_mut(&id) else {
            return Ok(false);
        };
        if meeting.status != from {
            return Ok(false);
        }
        let now = Utc::now();
        meeting.status = to;
        match timestamp {
            TimestampField::StartedAt => meeting.started_at = Some(now),
            TimestampField::EndedAt => meeting.ended_at = Some(now),
        }
        meeting.updated_at = now;
        Ok(true)
    }

    async fn set_active(
        &self,
        id: i64,
        active: bool,
        status_override: Option<MeetingStatus>,
    ) -> Result<Option<Meeting>, MeetError> {
        let mut state = self.lock()?;
        let Some(meeting) = state.meetings.get_mut(&id) else {
            return Ok(None);
        };
        meeting.is_active = active;
        if let Some(status) = status_override {
            meeting.status = status;
        }
        meeting.updated_at = Utc::now();
        Ok(Some(meeting.clone()))
    }

    async fn ping(&self) -> Result<(), MeetError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_by_room_name_exact_match() {
        let registry = InMemoryMeetingRegistry::new();
        let seeded = registry
            .insert_meeting(MeetingSeed::new("acme/standup", 1))
            .unwrap();

        let found = registry.find_by_room_name("acme/standup").await.unwrap();
        assert_eq!(found, Some(seeded));
        assert!(registry.find_by_room_name("standup").await.unwrap().is_none());
        assert_eq!(registry.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_conditional_transition_only_from_expected_status() {
        let registry = InMemoryMeetingRegistry::new();
        let meeting = registry
            .insert_meeting(MeetingSeed::new("acme/standup", 1))
            .unwrap();

        let first = registry
            .conditional_transition(
                meeting.id,
                MeetingStatus::Scheduled,
                MeetingStatus::Active,
                TimestampField::StartedAt,
            )
            .await
            .unwrap();
        let second = registry
            .conditional_transition(
                meeting.id,
                MeetingStatus::Scheduled,
                MeetingStatus::Active,
                TimestampField::StartedAt,
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        let stored = registry.find_by_id(meeting.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MeetingStatus::Active);
        assert!(stored.started_at.is_some());
    }

    #[tokio::test]
    async fn test_conditional_transition_unknown_meeting_is_false() {
        let registry = InMemoryMeetingRegistry::new();
        let moved = registry
            .conditional_transition(
                99,
                MeetingStatus::Scheduled,
                MeetingStatus::Active,
                TimestampField::StartedAt,
            )
            .await
            .unwrap();
        assert!(!moved);
    }

    #[tokio::test]
    async fn test_set_active_with_and_without_override() {
        let registry = InMemoryMeetingRegistry::new();
        let meeting = registry
            .insert_meeting(MeetingSeed::new("acme/standup", 1))
            .unwrap();

        let disabled = registry
            .set_active(meeting.id, false, Some(MeetingStatus::Cancelled))
            .await
            .unwrap()
            .unwrap();
        assert!(!disabled.is_active);
        assert_eq!(disabled.status, MeetingStatus::Cancelled);

        let enabled = registry
            .set_active(meeting.id, true, None)
            .await
            .unwrap()
            .unwrap();
        assert!(enabled.is_active);
        assert_eq!(enabled.status, MeetingStatus::Cancelled);

        assert!(registry.set_active(404, true, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_participants_are_append_only() {
        let registry = InMemoryMeetingRegistry::new();
        let meeting = registry
            .insert_meeting(MeetingSeed::new("acme/standup", 1))
            .unwrap();

        let join = NewParticipant {
            meeting_id: meeting.id,
            user_id: Some(5),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            is_moderator: false,
        };
        let a = registry.insert_participant(join.clone()).await.unwrap();
        let b = registry.insert_participant(join).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(registry.list_participants(meeting.id).await.unwrap().len(), 2);
        assert!(registry.list_participants(meeting.id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_participant_for_unknown_meeting_fails() {
        let registry = InMemoryMeetingRegistry::new();
        let result = registry
            .insert_participant(NewParticipant {
                meeting_id: 7,
                user_id: None,
                name: "Guest".to_string(),
                email: "guest@meet.example.com".to_string(),
                is_moderator: false,
            })
            .await;
        assert!(matches!(result, Err(MeetError::Database(_))));
    }

    #[tokio::test]
    async fn test_unavailable_registry_fails_every_operation() {
        let registry = InMemoryMeetingRegistry::new();
        registry.set_unavailable(true);

        assert!(matches!(
            registry.find_by_room_name("acme/x").await,
            Err(MeetError::Database(_))
        ));
        assert!(matches!(registry.ping().await, Err(MeetError::Database(_))));

        registry.set_unavailable(false);
        assert!(registry.ping().await.is_ok());
    }
}
