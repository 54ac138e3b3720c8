use serde::{Deserialize, Serialize};

/// Postgres connection settings for the Meeting Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string. May also be supplied via the `DATABASE_URL`
    /// env var, which takes precedence over this field when set.
    #[serde(default = "d_url")]
    pub url: String,
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            max_connections: d_max_connections(),
        }
    }
}

fn d_url() -> String {
    "postgres://localhost/meeting_bot_orchestrator".into()
}

fn d_max_connections() -> u32 {
    10
}

impl DatabaseConfig {
    /// Resolve the effective connection string: `DATABASE_URL` env var
    /// wins over the configured value, mirroring common 12-factor practice.
    pub fn effective_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.url.clone())
    }
}
