//! Runtime Launcher: the polymorphic boundary between the orchestrator and
//! whatever actually runs bot workloads.

pub mod docker;
pub mod nomad;
pub mod traits;

pub use docker::DockerLauncher;
pub use nomad::NomadLauncher;
pub use traits::{limit_exceeded, BotHandle, RuntimeLauncher, StartBotArgs, StartedBot};

use std::sync::Arc;

use mb_domain::config::{LauncherConfig, LauncherKind};
use mb_domain::Result;

/// Builds the configured backend and returns it behind a single trait
/// object, selected once at startup by `launcher.kind`.
pub fn from_config(config: &LauncherConfig) -> Result<Arc<dyn RuntimeLauncher>> {
    match config.kind {
        LauncherKind::Docker => {
            let launcher = DockerLauncher::connect(
                &config.docker,
                config.bot_image.clone(),
                config.callback_base_url.clone(),
                config.call_timeout_secs,
            )?;
            Ok(Arc::new(launcher))
        }
        LauncherKind::Nomad => {
            let launcher = NomadLauncher::new(
                &config.nomad,
                config.bot_image.clone(),
                config.callback_base_url.clone(),
                config.call_timeout_secs,
            )?;
            Ok(Arc::new(launcher))
        }
    }
}
