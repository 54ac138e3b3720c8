use std::collections::HashMap;
use std::sync::Arc;

use mb_domain::config::{Config, UserConfig};
use mb_launcher::RuntimeLauncher;
use mb_store::{MeetingSessionsRepository, MeetingsRepository};

/// Shared application state passed to every HTTP handler.
///
/// Fields are grouped by concern:
/// - **Core services** — config, the meeting/session stores, the bus client
/// - **Runtime** — the pluggable launcher
/// - **Security** — per-token user lookup, internal callback secret
#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub meetings: Arc<MeetingsRepository>,
    pub sessions: Arc<MeetingSessionsRepository>,
    pub bus: mb_bus::BusClient,

    // ── Runtime ──────────────────────────────────────────────────────
    pub launcher: Arc<dyn RuntimeLauncher>,

    // ── Security (startup-computed) ─────────────────────────────────
    /// API bearer token → the user it authenticates as. Built once from
    /// `config.auth.users` at startup.
    pub api_users: Arc<HashMap<String, UserConfig>>,
    /// SHA-256 hash of the internal callback secret. `None` disables the
    /// check (dev mode) — a warning is logged at startup in that case.
    pub internal_secret_hash: Option<Vec<u8>>,
}

/// The user resolved from a request's bearer token, attached as a request
/// extension by [`crate::api::auth::require_api_token`].
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: uuid::Uuid,
    pub max_concurrent_bots: u32,
    /// The bearer token the request authenticated with, forwarded to the
    /// bot process as `StartBotArgs::user_token` so the bot can call back
    /// into the core's own public API (e.g. to resolve meeting metadata)
    /// under the same identity that requested it.
    pub token: String,
}
