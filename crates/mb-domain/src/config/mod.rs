mod auth;
mod bus;
mod database;
mod launcher;
mod observability;
mod reaper;
mod server;

pub use auth::*;
pub use bus::*;
pub use database::*;
pub use launcher::*;
pub use observability::*;
pub use reaper::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.database.effective_url().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "database.url".into(),
                message: "database url must not be empty (set database.url or DATABASE_URL)"
                    .into(),
            });
        }

        if self.bus.effective_url().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "bus.url".into(),
                message: "bus url must not be empty (set bus.url or REDIS_URL)".into(),
            });
        }

        if self.launcher.bot_image.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "launcher.bot_image".into(),
                message: "bot_image must not be empty".into(),
            });
        }

        if !self.launcher.callback_base_url.starts_with("http://")
            && !self.launcher.callback_base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "launcher.callback_base_url".into(),
                message: format!(
                    "callback_base_url must start with http:// or https:// (got \"{}\")",
                    self.launcher.callback_base_url
                ),
            });
        }

        if self.launcher.call_timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "launcher.call_timeout_secs".into(),
                message: "call_timeout_secs must be greater than 0".into(),
            });
        }

        if std::env::var(&self.server.api_token_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.api_token_env".into(),
                message: format!(
                    "{} is not set — public /bots endpoints will run unauthenticated",
                    self.server.api_token_env
                ),
            });
        }

        if std::env::var(&self.auth.internal_secret_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.internal_secret_env".into(),
                message: format!(
                    "{} is not set — internal callback endpoints will run unauthenticated",
                    self.auth.internal_secret_env
                ),
            });
        }

        if self.auth.users.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "auth.users".into(),
                message: "no users configured — all bearer tokens will be rejected".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.auth.users.insert(
            "tok-123".into(),
            UserConfig {
                user_id: uuid::Uuid::new_v4(),
                max_concurrent_bots: 2,
            },
        );
        cfg
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn launcher_bad_callback_url_is_error() {
        let mut cfg = valid_config();
        cfg.launcher.callback_base_url = "ftp://example.com".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "launcher.callback_base_url")
            .expect("expected callback_base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn no_users_is_warning() {
        let cfg = Config::default();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "auth.users").expect("expected no-users warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowed_origins")
            .expect("expected CORS wildcard warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
