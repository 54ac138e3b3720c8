use serde::{Deserialize, Serialize};

/// Delayed Reaper timing. Defaults mirror the timings the bot-manager
/// service has always used: a ~30s best-effort stop after a `leave`
/// command, and a tighter ~10s safety-net stop after a non-zero exit code
/// that still reports a live container handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    #[serde(default = "d_general_delay_secs")]
    pub general_delay_secs: u64,
    #[serde(default = "d_error_exit_delay_secs")]
    pub error_exit_delay_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            general_delay_secs: d_general_delay_secs(),
            error_exit_delay_secs: d_error_exit_delay_secs(),
        }
    }
}

fn d_general_delay_secs() -> u64 {
    30
}

fn d_error_exit_delay_secs() -> u64 {
    10
}
