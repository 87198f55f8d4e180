// ABOUTME: Configuration loading and validation for the notesd server.
// ABOUTME: Reads NOTESD_* environment variables and refuses unsafe remote setups.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NOTESD_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("NOTESD_BIND {0} is not a loopback address; set NOTESD_ALLOW_REMOTE=true to allow it")]
    RemoteBindNotAllowed(SocketAddr),

    #[error(
        "NOTESD_ALLOW_REMOTE is true but NOTESD_AUTH_TOKEN is not set; refusing to start without authentication"
    )]
    RemoteWithoutToken,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct NotesdConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    pub auth_token: Option<String>,
    pub auto_init: bool,
}

impl NotesdConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - NOTESD_HOME: data directory (default: ~/.notesd)
    /// - NOTESD_DB: database file (default: $NOTESD_HOME/notes.db)
    /// - NOTESD_BIND: socket address to bind (default: 127.0.0.1:7332)
    /// - NOTESD_ALLOW_REMOTE: allow non-loopback binds (default: false)
    /// - NOTESD_AUTH_TOKEN: bearer token for API auth (optional)
    /// - NOTESD_AUTO_INIT: send INIT on startup (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let home = var("NOTESD_HOME").map(PathBuf::from).unwrap_or_else(|| {
            var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".notesd")
        });

        let db_path = var("NOTESD_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("notes.db"));

        let bind_str = var("NOTESD_BIND").unwrap_or_else(|| "127.0.0.1:7332".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = var("NOTESD_ALLOW_REMOTE").is_some_and(|v| is_truthy(&v));
        let auth_token = var("NOTESD_AUTH_TOKEN");
        let auto_init = var("NOTESD_AUTO_INIT").is_none_or(|v| is_truthy(&v));

        if !allow_remote && !bind.ip().is_loopback() {
            return Err(ConfigError::RemoteBindNotAllowed(bind));
        }
        if allow_remote && auth_token.is_none() {
            return Err(ConfigError::RemoteWithoutToken);
        }

        Ok(Self {
            home,
            db_path,
            bind,
            allow_remote,
            auth_token,
            auto_init,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<NotesdConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NotesdConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[("HOME", "/home/writer")]).unwrap();

        assert_eq!(config.home, PathBuf::from("/home/writer/.notesd"));
        assert_eq!(config.db_path, PathBuf::from("/home/writer/.notesd/notes.db"));
        assert_eq!(config.bind, "127.0.0.1:7332".parse::<SocketAddr>().unwrap());
        assert!(!config.allow_remote);
        assert!(config.auth_token.is_none());
        assert!(config.auto_init);
    }

    #[test]
    fn db_path_overrides_home() {
        let config = load(&[("NOTESD_HOME", "/data"), ("NOTESD_DB", "/elsewhere/j.db")]).unwrap();
        assert_eq!(config.home, PathBuf::from("/data"));
        assert_eq!(config.db_path, PathBuf::from("/elsewhere/j.db"));
    }

    #[test]
    fn auto_init_can_be_disabled() {
        let config = load(&[("NOTESD_AUTO_INIT", "false")]).unwrap();
        assert!(!config.auto_init);
    }

    #[test]
    fn config_rejects_invalid_bind() {
        let err = load(&[("NOTESD_BIND", "not-an-address")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind(_)));
    }

    #[test]
    fn config_rejects_public_bind_without_allow_remote() {
        let err = load(&[("NOTESD_BIND", "0.0.0.0:7332")]).unwrap_err();
        assert!(matches!(err, ConfigError::RemoteBindNotAllowed(_)));
    }

    #[test]
    fn config_rejects_remote_without_token() {
        let err = load(&[("NOTESD_ALLOW_REMOTE", "true")]).unwrap_err();
        assert!(
            err.to_string().contains("NOTESD_AUTH_TOKEN"),
            "error should mention auth token: {}",
            err
        );

        let config = load(&[
            ("NOTESD_ALLOW_REMOTE", "yes"),
            ("NOTESD_AUTH_TOKEN", "abc"),
            ("NOTESD_BIND", "0.0.0.0:80"),
        ])
        .unwrap();
        assert!(config.allow_remote);
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
    }
}
