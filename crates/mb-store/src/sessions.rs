//! `meeting_sessions` table operations — one row per bot incarnation.

use chrono::{DateTime, Utc};
use mb_domain::{Error, Result};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::model::MeetingSession;

#[derive(FromRow)]
struct SessionRow {
    meeting_id: Uuid,
    session_uid: String,
    session_start_time: DateTime<Utc>,
}

impl From<SessionRow> for MeetingSession {
    fn from(row: SessionRow) -> Self {
        Self {
            meeting_id: row.meeting_id,
            session_uid: row.session_uid,
            session_start_time: row.session_start_time,
        }
    }
}

pub struct MeetingSessionsRepository {
    pool: PgPool,
}

impl MeetingSessionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `RecordSessionStart` — idempotent on `(meeting_id, session_uid)`.
    pub async fn record_session_start(&self, meeting_id: Uuid, session_uid: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO meeting_sessions (meeting_id, session_uid, session_start_time) \
             VALUES ($1, $2, now()) ON CONFLICT (meeting_id, session_uid) DO NOTHING",
        )
        .bind(meeting_id)
        .bind(session_uid)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("record_session_start: {e}")))?;
        Ok(())
    }

    /// The earliest session for a meeting — the "original connection id"
    /// used for stop commands (invariant 6).
    pub async fn earliest_session_uid(&self, meeting_id: Uuid) -> Result<Option<String>> {
        self.session_uid_ordered(meeting_id, true).await
    }

    /// The latest session for a meeting — used for live reconfigure
    /// commands (invariant 6).
    pub async fn latest_session_uid(&self, meeting_id: Uuid) -> Result<Option<String>> {
        self.session_uid_ordered(meeting_id, false).await
    }

    async fn session_uid_ordered(&self, meeting_id: Uuid, ascending: bool) -> Result<Option<String>> {
        let order = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT session_uid FROM meeting_sessions WHERE meeting_id = $1 \
             ORDER BY session_start_time {order} LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(meeting_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("session_uid_ordered: {e}")))?;
        row.map(|r| r.try_get::<String, _>("session_uid"))
            .transpose()
            .map_err(|e| Error::Other(format!("session_uid_ordered: column: {e}")))
    }

    /// Resolve the `meeting_id` owning a `session_uid` — used by the bot
    /// callback handlers, which only know the session, not the meeting.
    pub async fn find_meeting_id(&self, session_uid: &str) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT meeting_id FROM meeting_sessions WHERE session_uid = $1")
            .bind(session_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("find_meeting_id: {e}")))?;
        row.map(|r| r.try_get::<Uuid, _>("meeting_id"))
            .transpose()
            .map_err(|e| Error::Other(format!("find_meeting_id: column: {e}")))
    }
}
