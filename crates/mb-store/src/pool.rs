//! Postgres pool construction and schema bootstrap.

use mb_domain::config::DatabaseConfig;
use mb_domain::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres using the resolved `DATABASE_URL`/`database.url`.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.effective_url())
        .await
        .map_err(|e| Error::Other(format!("connecting to database: {e}")))
}

/// DDL for the two tables this crate owns. A real deployment would run
/// this through proper migration tooling, but a fresh local/dev database
/// needs somewhere to start from.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meetings (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    platform TEXT NOT NULL,
    platform_specific_id TEXT NOT NULL,
    status TEXT NOT NULL,
    bot_container_id TEXT,
    start_time TIMESTAMPTZ,
    end_time TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    data JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE INDEX IF NOT EXISTS meetings_user_platform_native_idx
    ON meetings (user_id, platform, platform_specific_id, created_at DESC);

CREATE TABLE IF NOT EXISTS meeting_sessions (
    meeting_id UUID NOT NULL REFERENCES meetings(id),
    session_uid TEXT NOT NULL,
    session_start_time TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (meeting_id, session_uid)
);

CREATE INDEX IF NOT EXISTS meeting_sessions_start_time_idx
    ON meeting_sessions (meeting_id, session_start_time);
"#;

/// Run the schema bootstrap against `pool`. Idempotent.
///
/// Executed one statement at a time (rather than as a single multi-statement
/// batch) since the simple query protocol used by `sqlx::query` does not
/// support statement batching portably across drivers.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| Error::Other(format!("ensure_schema: {e}")))?;
    }
    Ok(())
}
