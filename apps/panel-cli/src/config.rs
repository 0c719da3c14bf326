//! Panel configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/kady-panel/panel.toml`
//! - Windows: `%APPDATA%/kady-panel/panel.toml`
//!
//! The secret never lives in the file; it comes from `KADY_PANEL_SECRET`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kady_gateway_client::SessionConfig;

/// Environment variable holding the panel secret.
pub const SECRET_ENV: &str = "KADY_PANEL_SECRET";
/// Environment variable overriding [`PanelConfig::host`].
pub const HOST_ENV: &str = "KADY_PANEL_HOST";

/// Panel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Gateway host, optionally with a `ws://`/`wss://` scheme.
    #[serde(default = "default_host")]
    pub host: String,

    /// Panel identifier presented in the handshake.
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Use `wss://` for bare hosts.
    #[serde(default)]
    pub tls: bool,

    /// Transport open timeout in seconds (0 = wait indefinitely).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Handshake ack timeout in seconds (0 = wait indefinitely).
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Protocol heartbeat period in seconds (0 = disabled).
    #[serde(default)]
    pub heartbeat_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1:8080".into()
}

fn default_identifier() -> String {
    "admin".into()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_handshake_timeout() -> u64 {
    30
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            identifier: default_identifier(),
            tls: false,
            connect_timeout_secs: default_connect_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            heartbeat_secs: 0,
        }
    }
}

impl PanelConfig {
    /// Loads configuration from disk, or creates a default if not found.
    ///
    /// `KADY_PANEL_HOST` overrides the stored host without being saved.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        if let Ok(host) = std::env::var(HOST_ENV)
            && !host.trim().is_empty()
        {
            config.host = host;
        }
        Ok(config)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Session tuning derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        SessionConfig {
            tls: self.tls,
            connect_timeout: secs(self.connect_timeout_secs),
            handshake_timeout: secs(self.handshake_timeout_secs),
            heartbeat_interval: secs(self.heartbeat_secs),
            ..SessionConfig::default()
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("kady-panel").join("panel.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("kady-panel")
            .join("panel.toml"))
    }
}
