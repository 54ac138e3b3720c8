//! Meeting Store: `meetings` table operations.
//!
//! Backed by `sqlx::PgPool`. Queries are built with the runtime-checked
//! `sqlx::query`/`query_as` API (not the `query!` compile-time macros,
//! which need a live `DATABASE_URL` at build time — unavailable in this
//! environment) but the row shapes are still strongly typed via
//! `sqlx::FromRow`.

use chrono::{DateTime, Utc};
use mb_domain::{Error, Result};
use mb_fsm::{CompletionReason, FailureStage, Status, TransitionSource, ACTIVE_SET};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::model::{platform_from_db, platform_to_db, status_from_db, status_to_db, Meeting};
use crate::transition::{rebuild_data, TransitionRecord};

fn active_status_strs() -> Vec<&'static str> {
    ACTIVE_SET.iter().copied().map(status_to_db).collect()
}

#[derive(FromRow)]
struct MeetingRow {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    platform_specific_id: String,
    status: String,
    bot_container_id: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    data: Value,
}

impl MeetingRow {
    fn into_meeting(self) -> Result<Meeting> {
        Ok(Meeting {
            id: self.id,
            user_id: self.user_id,
            platform: platform_from_db(&self.platform)?,
            platform_specific_id: self.platform_specific_id,
            status: status_from_db(&self.status)?,
            bot_container_id: self.bot_container_id,
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: self.created_at,
            data: self.data,
        })
    }
}

/// Outcome of [`MeetingsRepository::create_meeting`].
pub enum CreateOutcome {
    /// A fresh `REQUESTED` row was inserted.
    Created(Meeting),
    /// Invariant 1 already holds a row in the active set for this
    /// `(user, platform, native_id)`; the conflicting row is returned so
    /// the caller can report its id.
    Conflict(Meeting),
}

/// Arguments accepted by [`MeetingsRepository::apply_transition`], covering
/// every optional field a recorded transition may carry.
#[derive(Debug, Clone, Default)]
pub struct TransitionArgs {
    pub reason: Option<String>,
    pub completion_reason: Option<CompletionReason>,
    pub failure_stage: Option<FailureStage>,
    pub error_details: Option<Value>,
    /// Caller-supplied metadata merged into the transition entry itself
    /// (e.g. `exit_code`), never overwriting the fixed fields.
    pub extra: Map<String, Value>,
    /// A fresh launcher handle to (re)bind onto `bot_container_id`.
    pub container_id: Option<String>,
    /// When set, merged into `data.last_error` atomically with this write.
    pub last_error: Option<Value>,
}

pub struct MeetingsRepository {
    pool: PgPool,
}

impl MeetingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `CreateMeeting` — enforces the one-active-meeting-per-key rule with
    /// a single atomic `INSERT ... SELECT ... WHERE NOT EXISTS` (no
    /// read-then-write race).
    pub async fn create_meeting(
        &self,
        user_id: Uuid,
        platform: mb_domain::Platform,
        platform_specific_id: &str,
        passcode: Option<&str>,
    ) -> Result<CreateOutcome> {
        let platform_str = platform_to_db(platform);
        let id = Uuid::new_v4();
        let mut data = Map::new();
        data.insert("status_transition".into(), Value::Array(Vec::new()));
        if let Some(p) = passcode {
            data.insert("passcode".into(), Value::String(p.to_owned()));
        }

        let row: Option<MeetingRow> = sqlx::query_as(
            r#"
            INSERT INTO meetings (id, user_id, platform, platform_specific_id, status, data)
            SELECT $1, $2, $3, $4, 'requested', $5
            WHERE NOT EXISTS (
                SELECT 1 FROM meetings
                WHERE user_id = $2
                  AND platform = $3
                  AND platform_specific_id = $4
                  AND status = ANY($6)
            )
            RETURNING id, user_id, platform, platform_specific_id, status,
                      bot_container_id, start_time, end_time, created_at, data
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&platform_str)
        .bind(platform_specific_id)
        .bind(Value::Object(data))
        .bind(active_status_strs())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("create_meeting: {e}")))?;

        match row {
            Some(row) => Ok(CreateOutcome::Created(row.into_meeting()?)),
            None => {
                let conflict = self
                    .find_latest_in_active_set(user_id, platform, platform_specific_id)
                    .await?
                    .ok_or_else(|| {
                        Error::Other(
                            "create_meeting: insert guard rejected but no conflicting row found \
                             (concurrent terminal transition?)"
                                .into(),
                        )
                    })?;
                Ok(CreateOutcome::Conflict(conflict))
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Meeting>> {
        let row: Option<MeetingRow> = sqlx::query_as(
            "SELECT id, user_id, platform, platform_specific_id, status, bot_container_id, \
             start_time, end_time, created_at, data FROM meetings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("get: {e}")))?;
        row.map(MeetingRow::into_meeting).transpose()
    }

    /// `FindLatest` — the latest Meeting for the tuple regardless of status.
    pub async fn find_latest(
        &self,
        user_id: Uuid,
        platform: mb_domain::Platform,
        platform_specific_id: &str,
    ) -> Result<Option<Meeting>> {
        let platform_str = platform_to_db(platform);
        let row: Option<MeetingRow> = sqlx::query_as(
            "SELECT id, user_id, platform, platform_specific_id, status, bot_container_id, \
             start_time, end_time, created_at, data FROM meetings \
             WHERE user_id = $1 AND platform = $2 AND platform_specific_id = $3 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(&platform_str)
        .bind(platform_specific_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("find_latest: {e}")))?;
        row.map(MeetingRow::into_meeting).transpose()
    }

    async fn find_latest_in_active_set(
        &self,
        user_id: Uuid,
        platform: mb_domain::Platform,
        platform_specific_id: &str,
    ) -> Result<Option<Meeting>> {
        let platform_str = platform_to_db(platform);
        let row: Option<MeetingRow> = sqlx::query_as(
            "SELECT id, user_id, platform, platform_specific_id, status, bot_container_id, \
             start_time, end_time, created_at, data FROM meetings \
             WHERE user_id = $1 AND platform = $2 AND platform_specific_id = $3 \
             AND status = ANY($4) ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(&platform_str)
        .bind(platform_specific_id)
        .bind(active_status_strs())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("find_latest_in_active_set: {e}")))?;
        row.map(MeetingRow::into_meeting).transpose()
    }

    /// `CountActiveForUser`.
    pub async fn count_active_for_user(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM meetings WHERE user_id = $1 AND status = ANY($2)",
        )
        .bind(user_id)
        .bind(active_status_strs())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Other(format!("count_active_for_user: {e}")))?;
        Ok(row.try_get::<i64, _>("n").unwrap_or(0))
    }

    /// `ApplyTransition` — re-reads `status`/`data` inside this call, rejects
    /// invalid transitions without mutating anything, and otherwise performs
    /// the copy-on-write `data` rebuild plus an optimistic
    /// `WHERE status = $previous` update so a losing concurrent writer gets
    /// `false` back instead of clobbering state it never validated against.
    pub async fn apply_transition(
        &self,
        meeting_id: Uuid,
        target: Status,
        source: TransitionSource,
        args: TransitionArgs,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Other(format!("apply_transition: begin: {e}")))?;

        let row = sqlx::query(
            "SELECT status, data, start_time FROM meetings WHERE id = $1 FOR UPDATE",
        )
        .bind(meeting_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Other(format!("apply_transition: select: {e}")))?;

        let Some(row) = row else {
            return Ok(false);
        };

        let current_status_str: String = row
            .try_get("status")
            .map_err(|e| Error::Other(format!("apply_transition: status column: {e}")))?;
        let current_status = status_from_db(&current_status_str)?;
        let existing_data: Value = row
            .try_get("data")
            .map_err(|e| Error::Other(format!("apply_transition: data column: {e}")))?;
        let start_time_already_set: Option<DateTime<Utc>> = row
            .try_get("start_time")
            .map_err(|e| Error::Other(format!("apply_transition: start_time column: {e}")))?;

        if !current_status.can_transition_to(target) {
            // Invalid transition: no state change, no audit entry, no commit.
            return Ok(false);
        }

        let record = TransitionRecord {
            from: current_status,
            to: target,
            timestamp: Utc::now(),
            source,
            reason: args.reason,
            completion_reason: args.completion_reason,
            failure_stage: args.failure_stage,
            error_details: args.error_details,
            extra: args.extra,
        };

        let mut patch = Map::new();
        if let Some(last_error) = args.last_error {
            patch.insert("last_error".into(), last_error);
        }
        let new_data = rebuild_data(&existing_data, &record, &patch);

        let sets_start_time = target == Status::Active && start_time_already_set.is_none();
        let sets_end_time = target.is_terminal();

        let result = sqlx::query(
            r#"
            UPDATE meetings SET
                status = $2,
                data = $3,
                bot_container_id = COALESCE($4, bot_container_id),
                start_time = CASE WHEN $5 THEN now() ELSE start_time END,
                end_time = CASE WHEN $6 THEN now() ELSE end_time END
            WHERE id = $1 AND status = $7
            "#,
        )
        .bind(meeting_id)
        .bind(status_to_db(target))
        .bind(&new_data)
        .bind(&args.container_id)
        .bind(sets_start_time)
        .bind(sets_end_time)
        .bind(&current_status_str)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Other(format!("apply_transition: update: {e}")))?;

        if result.rows_affected() == 0 {
            // Lost the optimistic race against another writer; the
            // caller observes the now-committed state on its own re-read.
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Other(format!("apply_transition: commit: {e}")))?;
        Ok(true)
    }

    /// Sets the `data.stop_requested` latch without performing a status
    /// transition. Idempotent.
    pub async fn set_stop_requested(&self, meeting_id: Uuid) -> Result<()> {
        let row = sqlx::query("SELECT data FROM meetings WHERE id = $1")
            .bind(meeting_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("set_stop_requested: select: {e}")))?;
        let Some(row) = row else {
            return Err(Error::NotFound(format!("meeting {meeting_id}")));
        };
        let existing: Value = row
            .try_get("data")
            .map_err(|e| Error::Other(format!("set_stop_requested: data column: {e}")))?;
        let mut data = crate::transition::migrate_legacy_key(&existing)
            .as_object()
            .cloned()
            .unwrap_or_default();
        data.insert("stop_requested".into(), Value::Bool(true));

        sqlx::query("UPDATE meetings SET data = $2 WHERE id = $1")
            .bind(meeting_id)
            .bind(Value::Object(data))
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("set_stop_requested: update: {e}")))?;
        Ok(())
    }

    /// Sets `bot_container_id` without a status transition (used right
    /// after a successful launch, before the bot's first callback).
    pub async fn set_container_id(&self, meeting_id: Uuid, container_id: &str) -> Result<()> {
        sqlx::query("UPDATE meetings SET bot_container_id = $2 WHERE id = $1")
            .bind(meeting_id)
            .bind(container_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("set_container_id: {e}")))?;
        Ok(())
    }
}
