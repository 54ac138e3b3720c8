//! The polymorphic boundary between the orchestrator and whatever actually
//! runs bot workloads (a local container engine, a cluster scheduler, ...).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mb_domain::{Error, Platform, Result};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything needed to start a single bot workload.
#[derive(Debug, Clone)]
pub struct StartBotArgs {
    pub user_id: Uuid,
    pub meeting_id: Uuid,
    pub meeting_url: String,
    pub platform: Platform,
    pub native_id: String,
    pub bot_name: Option<String>,
    pub user_token: String,
    pub language: Option<String>,
    pub task: Option<String>,
}

/// What a successful launch returns: an opaque handle the caller persists
/// as `bot_container_id`, plus the freshly minted session identifier the
/// bot will use to authenticate its own callbacks.
#[derive(Debug, Clone)]
pub struct StartedBot {
    pub handle: String,
    pub session_uid: String,
}

/// A single entry in [`RuntimeLauncher::list_running_bots`].
#[derive(Debug, Clone, Serialize)]
pub struct BotHandle {
    pub platform: Platform,
    pub native_id: String,
    pub handle: String,
    pub created_at: DateTime<Utc>,
    pub labels: HashMap<String, String>,
}

/// Capability set any backend (Docker, Nomad, ...) must implement. Kept
/// deliberately small: the launcher never touches the meeting store, it
/// only starts, stops, and reports on workloads.
#[async_trait]
pub trait RuntimeLauncher: Send + Sync {
    /// Launches a bot workload. Enforces the per-user concurrency limit
    /// itself by cross-checking `list_running_bots` against `limit` before
    /// dispatching — callers don't need to repeat the check.
    async fn start_bot(&self, args: StartBotArgs, user_concurrency_limit: u32) -> Result<StartedBot>;

    /// Stops a workload by its opaque handle. Idempotent: a handle that no
    /// longer exists is treated as success, not an error.
    async fn stop_bot(&self, handle: &str) -> Result<()>;

    /// Reports whether the workload behind `handle` is still running.
    /// Backends that cannot distinguish "unknown" from "running" should
    /// fail safe and report `true` rather than risk a spurious reap.
    async fn verify_running(&self, handle: &str) -> Result<bool>;

    /// Lists every workload currently attributed to `user_id`, used both
    /// for the concurrency precheck and for the `ListRunningBots` API.
    async fn list_running_bots(&self, user_id: Uuid) -> Result<Vec<BotHandle>>;
}

/// Raised when a launch is rejected for exceeding `user.max_concurrent_bots`.
/// Carried as an [`Error::Limit`] so callers match on the error message
/// rather than a bespoke type — kept here as a constructor so every backend
/// spells the message identically.
pub fn limit_exceeded(user_id: Uuid, active: usize, limit: u32) -> Error {
    Error::Limit(format!(
        "user {user_id} already has {active} active bot(s), limit is {limit}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_exceeded_is_a_limit_error() {
        let user_id = Uuid::new_v4();
        let err = limit_exceeded(user_id, 3, 3);
        match err {
            Error::Limit(msg) => {
                assert!(msg.contains(&user_id.to_string()));
                assert!(msg.contains('3'));
            }
            other => panic!("expected Error::Limit, got {other:?}"),
        }
    }
}
