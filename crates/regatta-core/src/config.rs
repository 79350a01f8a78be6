//! Configuration system for Regatta.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $REGATTA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/regatta/config.toml
//!   3. ~/.config/regatta/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub host: HostIdentityConfig,
    pub session: SessionConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostIdentityConfig {
    /// Display name announced on the mesh.
    pub name: String,
}

/// Session limits. Fixed at construction of the session manager —
/// not runtime-reconfigurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Player slot count and hard connection cap.
    pub max_players: usize,
    /// Invitation timeout in seconds.
    pub invite_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network interface name. Empty = auto-detect.
    pub interface: String,
    /// UDP port for announcements.
    pub announce_port: u16,
    /// TCP port for session connections. 0 = OS-assigned.
    pub session_port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default player cap. Mirrors the four-seat boat.
pub const DEFAULT_MAX_PLAYERS: usize = 4;

/// Default invitation timeout in seconds.
pub const DEFAULT_INVITE_TIMEOUT_SECS: u64 = 30;

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: HostIdentityConfig::default(),
            session: SessionConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for HostIdentityConfig {
    fn default() -> Self {
        Self {
            name: "Regatta Host".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            invite_timeout_secs: DEFAULT_INVITE_TIMEOUT_SECS,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            announce_port: crate::wire::ANNOUNCE_PORT,
            session_port: 0,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("regatta")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl HostConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            HostConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("REGATTA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&HostConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply REGATTA_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REGATTA_HOST__NAME") {
            self.host.name = v;
        }
        if let Ok(v) = std::env::var("REGATTA_NETWORK__INTERFACE") {
            self.network.interface = v;
        }
        if let Ok(v) = std::env::var("REGATTA_NETWORK__ANNOUNCE_PORT") {
            if let Ok(p) = v.parse() {
                self.network.announce_port = p;
            }
        }
        if let Ok(v) = std::env::var("REGATTA_NETWORK__SESSION_PORT") {
            if let Ok(p) = v.parse() {
                self.network.session_port = p;
            }
        }
        if let Ok(v) = std::env::var("REGATTA_SESSION__MAX_PLAYERS") {
            if let Ok(n) = v.parse() {
                self.session.max_players = n;
            }
        }
        if let Ok(v) = std::env::var("REGATTA_SESSION__INVITE_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.session.invite_timeout_secs = n;
            }
        }
    }
}
