use serde::{Deserialize, Serialize};

/// Which [`crate`](../../mb_launcher)-level backend drives bot workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherKind {
    Docker,
    Nomad,
}

impl Default for LauncherKind {
    fn default() -> Self {
        LauncherKind::Docker
    }
}

/// Runtime launcher configuration (selects and configures the Docker or
/// Nomad backend that actually starts/stops bot containers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub kind: LauncherKind,
    /// Container image used for the bot workload, e.g. `ghcr.io/org/meeting-bot:latest`.
    #[serde(default = "d_bot_image")]
    pub bot_image: String,
    /// Base URL the bot uses to reach this orchestrator's internal callback
    /// endpoints (must be reachable from inside the container/job network).
    #[serde(default = "d_callback_base_url")]
    pub callback_base_url: String,
    /// Bounded timeout, in seconds, for any single launcher call (start/stop/verify).
    #[serde(default = "d_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Docker-specific settings. Only consulted when `kind = "docker"`.
    #[serde(default)]
    pub docker: DockerLauncherConfig,
    /// Nomad-specific settings. Only consulted when `kind = "nomad"`.
    #[serde(default)]
    pub nomad: NomadLauncherConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            kind: LauncherKind::default(),
            bot_image: d_bot_image(),
            callback_base_url: d_callback_base_url(),
            call_timeout_secs: d_call_timeout_secs(),
            docker: DockerLauncherConfig::default(),
            nomad: NomadLauncherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DockerLauncherConfig {
    /// Docker daemon socket/URL. `None` uses bollard's platform default
    /// (`unix:///var/run/docker.sock` on Unix).
    #[serde(default)]
    pub docker_host: Option<String>,
    /// Docker network the bot container should join.
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NomadLauncherConfig {
    #[serde(default = "d_nomad_addr")]
    pub address: String,
    #[serde(default = "d_nomad_namespace")]
    pub namespace: String,
    #[serde(default = "d_nomad_datacenters")]
    pub datacenters: Vec<String>,
}

impl Default for NomadLauncherConfig {
    fn default() -> Self {
        Self {
            address: d_nomad_addr(),
            namespace: d_nomad_namespace(),
            datacenters: d_nomad_datacenters(),
        }
    }
}

fn d_bot_image() -> String {
    "meeting-bot:latest".into()
}
fn d_callback_base_url() -> String {
    "http://localhost:8700".into()
}
fn d_call_timeout_secs() -> u64 {
    10
}
fn d_nomad_addr() -> String {
    "http://127.0.0.1:4646".into()
}
fn d_nomad_namespace() -> String {
    "default".into()
}
fn d_nomad_datacenters() -> Vec<String> {
    vec!["dc1".into()]
}
