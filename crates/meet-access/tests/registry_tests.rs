//! Postgres room registry integration tests.
//!
//! Runs `PgMeetingsRepository` against the schema in `migrations/` using
//! `#[sqlx::test]` for isolated test databases.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use meet_access::models::{MeetingStatus, NewParticipant, TimestampField};
use meet_access::repositories::{MeetingRegistry, PgMeetingsRepository};
use meet_access::services::lifecycle::{apply_kill_switch, record_join, JoinIdentity};
use sqlx::{PgPool, Row};

const RACERS: usize = 8;

/// Insert a meeting row directly; meeting creation is owned elsewhere.
async fn seed_meeting(
    pool: &PgPool,
    room_name: &str,
    created_by: i64,
    status: &str,
) -> Result<i64, anyhow::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO meetings (room_name, title, created_by, status)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(room_name)
    .bind("Standup")
    .bind(created_by)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

fn participant(meeting_id: i64, user_id: Option<i64>, name: &str) -> NewParticipant {
    NewParticipant {
        meeting_id,
        user_id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        is_moderator: user_id.is_some(),
    }
}

/// Test that find_by_room_name returns the stored meeting and misses cleanly.
#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_room_name_round_trip(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/standup", 7, "scheduled").await?;
    let repo = PgMeetingsRepository::new(pool);

    let meeting = repo
        .find_by_room_name("acme/standup")
        .await?
        .expect("Meeting should exist");
    assert_eq!(meeting.id, id);
    assert_eq!(meeting.room_name, "acme/standup");
    assert_eq!(meeting.created_by, 7);
    assert!(meeting.allow_guests);
    assert!(meeting.is_active);
    assert_eq!(meeting.status, MeetingStatus::Scheduled);
    assert!(meeting.started_at.is_none());

    assert!(repo.find_by_room_name("standup").await?.is_none());
    assert!(repo.find_by_room_name("other/standup").await?.is_none());
    assert_eq!(repo.find_by_id(id).await?.map(|m| m.id), Some(id));
    assert!(repo.find_by_id(id + 1000).await?.is_none());

    Ok(())
}

/// Test that participant records are appended, never deduplicated.
#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_participant_appends(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/retro", 1, "scheduled").await?;
    let repo = PgMeetingsRepository::new(pool);

    let user = repo.insert_participant(participant(id, Some(1), "Ada")).await?;
    assert_eq!(user.meeting_id, id);
    assert_eq!(user.user_id, Some(1));
    assert_eq!(user.name, "Ada");
    assert_eq!(user.email, "ada@example.com");
    assert!(user.is_moderator);
    assert!(user.left_at.is_none());

    let guest = repo.insert_participant(participant(id, None, "Bob")).await?;
    assert_eq!(guest.user_id, None);
    assert!(!guest.is_moderator);

    // Rejoin creates a new record
    let again = repo.insert_participant(participant(id, Some(1), "Ada")).await?;
    assert_ne!(again.id, user.id);

    let listed = repo.list_participants(id).await?;
    assert_eq!(listed.len(), 3);

    Ok(())
}

/// Test that concurrent scheduled -> active transitions succeed exactly once.
#[sqlx::test(migrations = "../../migrations")]
async fn test_conditional_transition_single_winner(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/race", 1, "scheduled").await?;
    let repo = PgMeetingsRepository::new(pool);

    let mut handles = Vec::with_capacity(RACERS);
    for _ in 0..RACERS {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.conditional_transition(
                id,
                MeetingStatus::Scheduled,
                MeetingStatus::Active,
                TimestampField::StartedAt,
            )
            .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await?? {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let meeting = repo.find_by_id(id).await?.expect("Meeting should exist");
    assert_eq!(meeting.status, MeetingStatus::Active);
    let started_at = meeting.started_at.expect("started_at should be stamped");

    // A late transition neither errors nor restamps
    let late = repo
        .conditional_transition(
            id,
            MeetingStatus::Scheduled,
            MeetingStatus::Active,
            TimestampField::StartedAt,
        )
        .await?;
    assert!(!late);
    let meeting = repo.find_by_id(id).await?.expect("Meeting should exist");
    assert_eq!(meeting.started_at, Some(started_at));

    Ok(())
}

/// Test that the ended_at stamp is applied only from the expected status.
#[sqlx::test(migrations = "../../migrations")]
async fn test_conditional_transition_stamps_ended_at(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/wrapup", 1, "active").await?;
    let repo = PgMeetingsRepository::new(pool);

    let wrong_from = repo
        .conditional_transition(
            id,
            MeetingStatus::Scheduled,
            MeetingStatus::Ended,
            TimestampField::EndedAt,
        )
        .await?;
    assert!(!wrong_from);

    let ended = repo
        .conditional_transition(
            id,
            MeetingStatus::Active,
            MeetingStatus::Ended,
            TimestampField::EndedAt,
        )
        .await?;
    assert!(ended);

    let meeting = repo.find_by_id(id).await?.expect("Meeting should exist");
    assert_eq!(meeting.status, MeetingStatus::Ended);
    assert!(meeting.ended_at.is_some());
    assert!(meeting.started_at.is_none());

    Ok(())
}

/// Test that disabling cancels and re-enabling leaves status alone.
#[sqlx::test(migrations = "../../migrations")]
async fn test_set_active_status_override(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/killed", 1, "active").await?;
    let repo = PgMeetingsRepository::new(pool);

    let disabled = repo
        .set_active(id, false, Some(MeetingStatus::Cancelled))
        .await?
        .expect("Meeting should exist");
    assert!(!disabled.is_active);
    assert_eq!(disabled.status, MeetingStatus::Cancelled);

    let enabled = repo
        .set_active(id, true, None)
        .await?
        .expect("Meeting should exist");
    assert!(enabled.is_active);
    assert_eq!(enabled.status, MeetingStatus::Cancelled);

    assert!(repo.set_active(id + 1000, false, None).await?.is_none());

    Ok(())
}

/// Test the lifecycle tracker end to end over Postgres.
#[sqlx::test(migrations = "../../migrations")]
async fn test_record_join_and_kill_switch(pool: PgPool) -> Result<(), anyhow::Error> {
    let id = seed_meeting(&pool, "acme/weekly", 1, "scheduled").await?;
    let repo = PgMeetingsRepository::new(pool);

    let identity = |name: &str| JoinIdentity {
        user_id: None,
        name: name.to_string(),
        email: format!("{}@meet.example.com", name.to_lowercase()),
        is_moderator: false,
    };

    let first = record_join(&repo, id, identity("Bob")).await?;
    assert!(first.started_meeting);
    let second = record_join(&repo, id, identity("Eve")).await?;
    assert!(!second.started_meeting);
    assert_eq!(repo.list_participants(id).await?.len(), 2);

    let killed = apply_kill_switch(&repo, id, true).await?;
    assert!(!killed.is_active);
    assert_eq!(killed.status, MeetingStatus::Cancelled);

    let restored = apply_kill_switch(&repo, id, false).await?;
    assert!(restored.is_active);
    assert_eq!(restored.status, MeetingStatus::Cancelled);

    Ok(())
}
