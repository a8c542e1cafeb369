//! Client configuration at `~/.stomp/config.toml`.
//!
//! Holds the protocol constants and timeouts the session uses. A missing file
//! means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stomp_client::SessionConfig;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session settings.
    #[serde(default)]
    pub session: SessionSection,
}

/// The `[session]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// `accept-version` sent in CONNECT.
    #[serde(default = "default_accept_version")]
    pub accept_version: String,

    /// `host` sent in CONNECT.
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long logout waits for the broker's receipt.
    #[serde(default = "default_disconnect_timeout")]
    pub disconnect_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            accept_version: default_accept_version(),
            virtual_host: default_virtual_host(),
            connect_timeout_secs: default_connect_timeout(),
            disconnect_timeout_secs: default_disconnect_timeout(),
        }
    }
}

fn default_accept_version() -> String {
    "1.2".to_string()
}

fn default_virtual_host() -> String {
    "stomp.cs.bgu.ac.il".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_disconnect_timeout() -> u64 {
    5
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            accept_version: self.accept_version.clone(),
            virtual_host: self.virtual_host.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            disconnect_timeout: Duration::from_secs(self.disconnect_timeout_secs),
        }
    }
}

/// `~/.stomp/config.toml`.
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".stomp").join("config.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.session.accept_version, "1.2");
        assert_eq!(cfg.session.virtual_host, "stomp.cs.bgu.ac.il");
        assert_eq!(cfg.session.connect_timeout_secs, 10);
        assert_eq!(cfg.session.disconnect_timeout_secs, 5);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[session]
accept_version = "1.1"
virtual_host = "broker.local"
connect_timeout_secs = 3
disconnect_timeout_secs = 1
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        let session = cfg.session.to_session_config();
        assert_eq!(session.accept_version, "1.1");
        assert_eq!(session.virtual_host, "broker.local");
        assert_eq!(session.connect_timeout, Duration::from_secs(3));
        assert_eq!(session.disconnect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[session]
disconnect_timeout_secs = 2
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.session.disconnect_timeout_secs, 2);
        assert_eq!(cfg.session.accept_version, "1.2"); // default
        assert_eq!(cfg.session.connect_timeout_secs, 10); // default
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.session.virtual_host, "stomp.cs.bgu.ac.il");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
