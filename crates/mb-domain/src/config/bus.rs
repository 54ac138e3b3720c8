use serde::{Deserialize, Serialize};

/// Redis event bus connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Connection string. May also be supplied via the `REDIS_URL` env var,
    /// which takes precedence over this field when set.
    #[serde(default = "d_url")]
    pub url: String,
    /// TTL, in seconds, for the `meeting_current_session` KV cache entry.
    #[serde(default = "d_session_cache_ttl_secs")]
    pub session_cache_ttl_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            session_cache_ttl_secs: d_session_cache_ttl_secs(),
        }
    }
}

fn d_url() -> String {
    "redis://127.0.0.1:6379".into()
}

fn d_session_cache_ttl_secs() -> u64 {
    86_400
}

impl BusConfig {
    pub fn effective_url(&self) -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| self.url.clone())
    }
}
