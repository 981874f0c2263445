//! Postgres-backed room registry.
//!
//! All queries are parameterized. Status changes use
//! `UPDATE ... WHERE status = $from` and inspect `rows_affected`, so
//! concurrent first joins produce exactly one `scheduled -> active`
//! transition.

use crate::errors::MeetError;
use crate::models::{Meeting, MeetingStatus, NewParticipant, Participant, TimestampField};
use crate::observability::metrics;
use crate::repositories::MeetingRegistry;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

const MEETING_COLUMNS: &str = "id, room_name, title, created_by, allow_guests, is_active, \
     status, max_participants, recording_enabled, started_at, ended_at, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str =
    "id, meeting_id, user_id, name, email, is_moderator, joined_at, left_at, duration_seconds";

/// Room registry over a Postgres connection pool.
#[derive(Clone)]
pub struct PgMeetingsRepository {
    pool: PgPool,
}

impl PgMeetingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Time a query and record its outcome under `operation`.
fn observe<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, MeetError> {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query(operation, status, start.elapsed());
    result.map_err(|e| MeetError::Database(e.to_string()))
}

#[async_trait::async_trait]
impl MeetingRegistry for PgMeetingsRepository {
    #[instrument(skip_all, name = "meet.repo.find_by_room_name")]
    async fn find_by_room_name(&self, room_name: &str) -> Result<Option<Meeting>, MeetError> {
        let start = Instant::now();
        let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE room_name = $1 LIMIT 1");

        let row = observe(
            "find_by_room_name",
            start,
            sqlx::query(&sql)
                .bind(room_name)
                .fetch_optional(&self.pool)
                .await,
        )?;

        row.map(map_row_to_meeting).transpose()
    }

    #[instrument(skip_all, name = "meet.repo.find_by_id", fields(meeting_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Meeting>, MeetError> {
        let start = Instant::now();
        let sql = format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = $1");

        let row = observe(
            "find_by_id",
            start,
            sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await,
        )?;

        row.map(map_row_to_meeting).transpose()
    }

    #[instrument(skip_all, name = "meet.repo.insert_participant", fields(meeting_id = participant.meeting_id))]
    async fn insert_participant(
        &self,
        participant: NewParticipant,
    ) -> Result<Participant, MeetError> {
        let start = Instant::now();
        let sql = format!(
            r#"
            INSERT INTO meeting_participants (meeting_id, user_id, name, email, is_moderator)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );

        let row = observe(
            "insert_participant",
            start,
            sqlx::query(&sql)
                .bind(participant.meeting_id) // $1
                .bind(participant.user_id) // $2
                .bind(&participant.name) // $3
                .bind(&participant.email) // $4
                .bind(participant.is_moderator) // $5
                .fetch_one(&self.pool)
                .await,
        )?;

        Ok(map_row_to_participant(&row))
    }

    #[instrument(skip_all, name = "meet.repo.list_participants", fields(meeting_id = meeting_id))]
    async fn list_participants(&self, meeting_id: i64) -> Result<Vec<Participant>, MeetError> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM meeting_participants \
             WHERE meeting_id = $1 ORDER BY joined_at, id"
        );

        let rows = observe(
            "list_participants",
            start,
            sqlx::query(&sql)
                .bind(meeting_id)
                .fetch_all(&self.pool)
                .await,
        )?;

        Ok(rows.iter().map(map_row_to_participant).collect())
    }

    #[instrument(
        skip_all,
        name = "meet.repo.conditional_transition",
        fields(meeting_id = id, stamp = timestamp.column())
    )]
    async fn conditional_transition(
        &self,
        id: i64,
        from: MeetingStatus,
        to: MeetingStatus,
        timestamp: TimestampField,
    ) -> Result<bool, MeetError> {
        let start = Instant::now();
        // Column names cannot be bound; the match keeps the statement text static.
        let sql = match timestamp {
            TimestampField::StartedAt => {
                "UPDATE meetings SET status = $3, started_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND status = $2"
            }
            TimestampField::EndedAt => {
                "UPDATE meetings SET status = $3, ended_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND status = $2"
            }
        };

        let result = observe(
            "conditional_transition",
            start,
            sqlx::query(sql)
                .bind(id) // $1
                .bind(from.as_str()) // $2
                .bind(to.as_str()) // $3
                .execute(&self.pool)
                .await,
        )?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip_all, name = "meet.repo.set_active", fields(meeting_id = id, active = active))]
    async fn set_active(
        &self,
        id: i64,
        active: bool,
        status_override: Option<MeetingStatus>,
    ) -> Result<Option<Meeting>, MeetError> {
        let start = Instant::now();
        let sql = format!(
            r#"
            UPDATE meetings
            SET is_active = $2, status = COALESCE($3, status), updated_at = NOW()
            WHERE id = $1
            RETURNING {MEETING_COLUMNS}
            "#
        );

        let row = observe(
            "set_active",
            start,
            sqlx::query(&sql)
                .bind(id) // $1
                .bind(active) // $2
                .bind(status_override.map(|s| s.as_str())) // $3
                .fetch_optional(&self.pool)
                .await,
        )?;

        row.map(map_row_to_meeting).transpose()
    }

    #[instrument(skip_all, name = "meet.repo.ping")]
    async fn ping(&self) -> Result<(), MeetError> {
        let start = Instant::now();
        observe(
            "ping",
            start,
            sqlx::query("SELECT 1").execute(&self.pool).await,
        )?;
        Ok(())
    }
}

/// Map a `meetings` row, rejecting unknown status values.
fn map_row_to_meeting(row: sqlx::postgres::PgRow) -> Result<Meeting, MeetError> {
    let status_str: String = row.get("status");
    let status = MeetingStatus::parse(&status_str).ok_or_else(|| {
        MeetError::Database(format!("unknown meeting status '{status_str}'"))
    })?;

    Ok(Meeting {
        id: row.get("id"),
        room_name: row.get("room_name"),
        title: row.get("title"),
        created_by: row.get("created_by"),
        allow_guests: row.get("allow_guests"),
        is_active: row.get("is_active"),
        status,
        max_participants: row.get("max_participants"),
        recording_enabled: row.get("recording_enabled"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn map_row_to_participant(row: &sqlx::postgres::PgRow) -> Participant {
    Participant {
        id: row.get("id"),
        meeting_id: row.get("meeting_id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        email: row.get("email"),
        is_moderator: row.get("is_moderator"),
        joined_at: row.get("joined_at"),
        left_at: row.get("left_at"),
        duration_seconds: row.get("duration_seconds"),
    }
}
