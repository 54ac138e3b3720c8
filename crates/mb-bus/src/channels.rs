//! Pure channel-key and payload builders for the three bus channel
//! families. Kept free of any Redis dependency so the wire shapes are
//! unit-testable without a broker.

use chrono::{DateTime, Utc};
use mb_domain::Platform;
use serde::Serialize;

/// `meetings_status::<platform>:<native_id>` — publisher-only.
pub fn status_channel(platform: Platform, native_id: &str) -> String {
    format!("meetings_status::{platform}:{native_id}")
}

/// `bot_commands:<session_uid>` — publisher-only.
pub fn command_channel(session_uid: &str) -> String {
    format!("bot_commands:{session_uid}")
}

/// `meeting_current_session::<platform>:<native_id>` — KV cache key for
/// the session-routing fast path.
pub fn current_session_key(platform: Platform, native_id: &str) -> String {
    format!("meeting_current_session::{platform}:{native_id}")
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRef {
    pub platform: Platform,
    pub native_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPayloadInner {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MeetingStatusMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub meeting: MeetingRef,
    pub payload: StatusPayloadInner,
    pub ts: DateTime<Utc>,
}

impl MeetingStatusMessage {
    pub fn new(platform: Platform, native_id: &str, status: &str) -> Self {
        Self {
            kind: "meeting.status",
            meeting: MeetingRef {
                platform,
                native_id: native_id.to_owned(),
            },
            payload: StatusPayloadInner {
                status: status.to_owned(),
            },
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BotCommand {
    Leave,
    Reconfigure {
        uid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        task: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_channel_matches_wire_format() {
        assert_eq!(
            status_channel(Platform::GoogleMeet, "abc-defg-hij"),
            "meetings_status::google_meet:abc-defg-hij"
        );
    }

    #[test]
    fn command_channel_matches_wire_format() {
        assert_eq!(command_channel("sess-1"), "bot_commands:sess-1");
    }

    #[test]
    fn current_session_key_matches_wire_format() {
        assert_eq!(
            current_session_key(Platform::Zoom, "123456789"),
            "meeting_current_session::zoom:123456789"
        );
    }

    #[test]
    fn status_message_serializes_with_type_tag() {
        let msg = MeetingStatusMessage::new(Platform::Teams, "mtg-1", "active");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "meeting.status");
        assert_eq!(v["meeting"]["platform"], "teams");
        assert_eq!(v["meeting"]["native_id"], "mtg-1");
        assert_eq!(v["payload"]["status"], "active");
    }

    #[test]
    fn leave_command_serializes_to_bare_action() {
        let v = serde_json::to_value(&BotCommand::Leave).unwrap();
        assert_eq!(v, serde_json::json!({ "action": "leave" }));
    }

    #[test]
    fn reconfigure_command_omits_absent_fields() {
        let cmd = BotCommand::Reconfigure {
            uid: "sess-1".into(),
            language: Some("es".into()),
            task: None,
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "action": "reconfigure", "uid": "sess-1", "language": "es" })
        );
    }
}
