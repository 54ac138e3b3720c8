//! `AppState` construction, extracted from `main.rs` so `serve` and
//! `doctor` can share the same boot sequence.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use mb_domain::config::{Config, ConfigSeverity};
use sha2::{Digest, Sha256};

use crate::state::AppState;

/// Validate config, initialize every subsystem, and return a fully-wired
/// [`AppState`]. Bails on the first config error; warnings are logged and
/// otherwise ignored.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Meeting Store ────────────────────────────────────────────────
    let pool = mb_store::pool::connect(&config.database)
        .await
        .context("connecting to database")?;
    mb_store::pool::ensure_schema(&pool).await.context("ensuring database schema")?;
    let meetings = Arc::new(mb_store::MeetingsRepository::new(pool.clone()));
    let sessions = Arc::new(mb_store::MeetingSessionsRepository::new(pool));
    tracing::info!("meeting store ready");

    // ── Event Bus Client ─────────────────────────────────────────────
    let bus = mb_bus::BusClient::connect(&config.bus).await.context("connecting to bus")?;
    tracing::info!(url = %config.bus.effective_url(), "bus client ready");

    // ── Runtime Launcher ─────────────────────────────────────────────
    let launcher = mb_launcher::from_config(&config.launcher).context("initializing launcher")?;
    tracing::info!(kind = ?config.launcher.kind, "runtime launcher ready");

    // ── API users (per-token lookup) ────────────────────────────────
    let api_users: HashMap<String, mb_domain::config::UserConfig> = config.auth.users.clone();
    tracing::info!(users = api_users.len(), "api token table ready");

    // ── Internal callback secret (read once, hashed) ────────────────
    let internal_secret_hash = match std::env::var(&config.auth.internal_secret_env) {
        Ok(secret) if !secret.is_empty() => {
            tracing::info!(env_var = %config.auth.internal_secret_env, "internal callback auth enabled");
            Some(Sha256::digest(secret.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var = %config.auth.internal_secret_env,
                "internal callback auth DISABLED — set {} to enable",
                config.auth.internal_secret_env,
            );
            None
        }
    };

    Ok(AppState {
        config,
        meetings,
        sessions,
        bus,
        launcher,
        api_users: Arc::new(api_users),
        internal_secret_hash,
    })
}
