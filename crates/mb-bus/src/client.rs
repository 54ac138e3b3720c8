//! A thin, best-effort wrapper around a shared Redis `ConnectionManager`.
//!
//! Every operation is bounded by a short timeout and never propagates a
//! failure back to a caller that has already committed state: the bus is
//! treated as best-effort, publish failures are logged and do not block
//! state mutations already committed.

use std::time::Duration;

use mb_domain::config::BusConfig;
use mb_domain::{Error, Platform, Result};
use mb_fsm::Status;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::channels::{command_channel, current_session_key, status_channel, BotCommand, MeetingStatusMessage};

const OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared handle to the Redis connection. One instance per process — the
/// only bus-related process-wide singleton.
#[derive(Clone)]
pub struct BusClient {
    manager: ConnectionManager,
    session_cache_ttl_secs: u64,
}

impl BusClient {
    /// Connect at startup. Unlike the per-operation calls below, a failure
    /// to establish the initial connection is propagated — there is no
    /// "already committed" state to protect yet.
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        let client = redis::Client::open(config.effective_url())
            .map_err(|e| Error::Availability(format!("invalid bus url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Availability(format!("connecting to bus: {e}")))?;
        Ok(Self {
            manager,
            session_cache_ttl_secs: config.session_cache_ttl_secs,
        })
    }

    /// Publish exactly one `meeting.status` message. Callers publish
    /// strictly after the corresponding FSM write commits.
    pub async fn publish_status(&self, platform: Platform, native_id: &str, status: Status) {
        let status_str = serde_json::to_value(status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let msg = MeetingStatusMessage::new(platform, native_id, &status_str);
        let channel = status_channel(platform, native_id);
        self.publish_best_effort(&channel, &msg).await;
    }

    /// Publish `{"action":"leave"}` on the target session's command channel.
    pub async fn publish_leave(&self, session_uid: &str) {
        let channel = command_channel(session_uid);
        self.publish_best_effort(&channel, &BotCommand::Leave).await;
    }

    /// Publish `{"action":"reconfigure", uid, language?, task?}`.
    pub async fn publish_reconfigure(
        &self,
        session_uid: &str,
        language: Option<String>,
        task: Option<String>,
    ) {
        let channel = command_channel(session_uid);
        let cmd = BotCommand::Reconfigure {
            uid: session_uid.to_owned(),
            language,
            task,
        };
        self.publish_best_effort(&channel, &cmd).await;
    }

    async fn publish_best_effort<T: serde::Serialize>(&self, channel: &str, payload: &T) {
        let Ok(body) = serde_json::to_string(payload) else {
            tracing::warn!(channel, "failed to serialize bus payload");
            return;
        };
        let mut conn = self.manager.clone();
        let fut = conn.publish::<_, _, i64>(channel, body);
        match tokio::time::timeout(OP_TIMEOUT, fut).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(channel, error = %e, "bus publish failed"),
            Err(_) => tracing::warn!(channel, "bus publish timed out"),
        }
    }

    /// Cache-writes `meeting_current_session::<platform>:<native_id>` with
    /// the TTL from config. Tolerates failure (fast path only — the
    /// `MeetingSession` query is the slow-path fallback).
    pub async fn cache_set_current_session(
        &self,
        platform: Platform,
        native_id: &str,
        session_uid: &str,
    ) {
        let key = current_session_key(platform, native_id);
        let mut conn = self.manager.clone();
        let fut = conn.set_ex::<_, _, ()>(&key, session_uid, self.session_cache_ttl_secs);
        match tokio::time::timeout(OP_TIMEOUT, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(key, error = %e, "bus cache write failed"),
            Err(_) => tracing::warn!(key, "bus cache write timed out"),
        }
    }

    /// Cache-reads the current session_uid. Returns `None` on absence or
    /// any failure so the caller falls back to the store.
    pub async fn cache_get_current_session(
        &self,
        platform: Platform,
        native_id: &str,
    ) -> Option<String> {
        let key = current_session_key(platform, native_id);
        let mut conn = self.manager.clone();
        let fut = conn.get::<_, Option<String>>(&key);
        match tokio::time::timeout(OP_TIMEOUT, fut).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                tracing::warn!(key, error = %e, "bus cache read failed");
                None
            }
            Err(_) => {
                tracing::warn!(key, "bus cache read timed out");
                None
            }
        }
    }
}
