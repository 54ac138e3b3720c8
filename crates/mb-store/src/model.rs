use chrono::{DateTime, Utc};
use mb_domain::{Error, Platform, Result};
use mb_fsm::Status;
use serde_json::Value;
use uuid::Uuid;

/// One row in the `meetings` table — one bot attempt.
///
/// Mirrors the Meeting record exactly; `data` is the free-form
/// metadata bag (`passcode`, `stop_requested`, `last_error`,
/// `status_transition`) described there.
#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub platform_specific_id: String,
    pub status: Status,
    pub bot_container_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl Meeting {
    /// `data.stop_requested`, defaulting to `false` when absent.
    pub fn stop_requested(&self) -> bool {
        self.data
            .get("stop_requested")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// `data.passcode`, if one was supplied on creation.
    pub fn passcode(&self) -> Option<&str> {
        self.data.get("passcode").and_then(Value::as_str)
    }
}

/// One row in the `meeting_sessions` table — one bot incarnation.
#[derive(Debug, Clone)]
pub struct MeetingSession {
    pub meeting_id: Uuid,
    pub session_uid: String,
    pub session_start_time: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire <-> domain conversions for the `status` / `platform` TEXT columns.
//
// `sqlx::Type` derives for enums require compile-time DB introspection we
// can't rely on here, so these are plain, explicit mappings — one source
// of truth for the wire strings, exercised by the round-trip tests below.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn status_to_db(status: Status) -> &'static str {
    match status {
        Status::Requested => "requested",
        Status::Joining => "joining",
        Status::AwaitingAdmission => "awaiting_admission",
        Status::Active => "active",
        Status::Completed => "completed",
        Status::Failed => "failed",
    }
}

pub fn status_from_db(raw: &str) -> Result<Status> {
    match raw {
        "requested" => Ok(Status::Requested),
        "joining" => Ok(Status::Joining),
        "awaiting_admission" => Ok(Status::AwaitingAdmission),
        "active" => Ok(Status::Active),
        "completed" => Ok(Status::Completed),
        "failed" => Ok(Status::Failed),
        other => Err(Error::Other(format!("unknown status in database: {other}"))),
    }
}

pub fn platform_to_db(platform: Platform) -> String {
    platform.to_string()
}

pub fn platform_from_db(raw: &str) -> Result<Platform> {
    raw.parse().map_err(Error::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_strings() {
        for s in [
            Status::Requested,
            Status::Joining,
            Status::AwaitingAdmission,
            Status::Active,
            Status::Completed,
            Status::Failed,
        ] {
            assert_eq!(status_from_db(status_to_db(s)).unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!(status_from_db("stopping").is_err());
    }

    #[test]
    fn platform_round_trips_through_db_strings() {
        for p in [Platform::GoogleMeet, Platform::Zoom, Platform::Teams] {
            assert_eq!(platform_from_db(&platform_to_db(p)).unwrap(), p);
        }
    }
}
