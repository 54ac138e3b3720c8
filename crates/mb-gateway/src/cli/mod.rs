pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};
use mb_domain::config::Config;

/// meeting-bot-orchestrator — an HTTP gateway for launching and
/// supervising meeting bots.
#[derive(Debug, Parser)]
#[command(name = "mb-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path specified by `MB_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the path
/// that was used. Shared by `serve`, `doctor`, and `config` subcommands.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("MB_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // `load_config` reads the process-wide `MB_CONFIG` env var; serialize
    // the two tests below so they don't race each other's mutation of it.
    static MB_CONFIG_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn load_config_falls_back_to_defaults_when_file_is_absent() {
        let _guard = MB_CONFIG_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.toml");
        std::env::set_var("MB_CONFIG", &missing);

        let (config, path) = load_config().unwrap();
        assert_eq!(path, missing.to_string_lossy());
        assert_eq!(config.server.port, 8700);

        std::env::remove_var("MB_CONFIG");
    }

    #[test]
    fn load_config_parses_an_existing_file() {
        let _guard = MB_CONFIG_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nport = 9100\n").unwrap();
        std::env::set_var("MB_CONFIG", &path);

        let (config, _) = load_config().unwrap();
        assert_eq!(config.server.port, 9100);

        std::env::remove_var("MB_CONFIG");
    }
}
