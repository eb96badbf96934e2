// src/config.rs
//! Runtime settings.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional `dpt-sync.toml` (or the file named by `DPT_SYNC_CONFIG`)
//! 3. `DPT_SYNC_*` environment variables, e.g. `DPT_SYNC_BASE_URL`

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://digitalpaper.local:8443";
pub const DEFAULT_RECEIVED_DIR: &str = "Document/Received";
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CONFIG_FILE: &str = "dpt-sync.toml";
const ENV_PREFIX: &str = "DPT_SYNC";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Origin of the device's HTTPS API.
    pub base_url: String,

    /// Trust the device's self-signed certificate.
    pub accept_invalid_certs: bool,

    pub ping_timeout_ms: u64,

    /// Deadline for ordinary device requests. `0` disables it.
    pub request_timeout_ms: u64,

    /// Device folder uploads land in.
    pub received_dir: String,

    /// Local directory holding `deviceid.dat` and `privatekey.dat`.
    pub credentials_dir: PathBuf,
}

impl Settings {
    /// Loads settings from defaults, the config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(Some(&path), true)
    }

    /// Builds settings from an optional file, optionally layering the
    /// environment on top.
    pub fn from_sources(file: Option<&str>, with_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("accept_invalid_certs", false)?
            .set_default("ping_timeout_ms", DEFAULT_PING_TIMEOUT_MS)?
            .set_default("request_timeout_ms", 0u64)?
            .set_default("received_dir", DEFAULT_RECEIVED_DIR)?
            .set_default(
                "credentials_dir",
                default_credentials_dir().to_string_lossy().into_owned(),
            )?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        if with_env {
            builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        }

        builder.build()?.try_deserialize()
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            accept_invalid_certs: false,
            ping_timeout_ms: DEFAULT_PING_TIMEOUT_MS,
            request_timeout_ms: 0,
            received_dir: DEFAULT_RECEIVED_DIR.to_string(),
            credentials_dir: default_credentials_dir(),
        }
    }
}

fn default_credentials_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dpt-sync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::from_sources(None, false).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ping_timeout(), Duration::from_secs(1));
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dpt-sync.toml");
        fs::write(
            &path,
            r#"
base_url = "https://192.168.1.20:8443"
accept_invalid_certs = true
request_timeout_ms = 30000
received_dir = "Document/Inbox"
"#,
        )
        .unwrap();

        let settings = Settings::from_sources(path.to_str(), false).unwrap();
        assert_eq!(settings.base_url, "https://192.168.1.20:8443");
        assert!(settings.accept_invalid_certs);
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.received_dir, "Document/Inbox");
        assert_eq!(settings.ping_timeout_ms, DEFAULT_PING_TIMEOUT_MS);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Settings::from_sources(path.to_str(), false).is_ok());
    }
}
