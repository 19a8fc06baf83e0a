//! Configuration system for Palaver.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PALAVER_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/palaver/config.toml
//!   3. ~/.config/palaver/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::DEFAULT_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PalaverConfig {
    pub network: NetworkConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the server binds. Clients resolve their own target.
    pub bind_addr: String,
    /// TCP port. The well-known deployment port by default.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrently connected users. Logins past this are refused
    /// with a "server is full" reply, never dropped silently.
    pub max_connections: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for PalaverConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_connections: 8 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("palaver")
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

impl PalaverConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PalaverConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PALAVER_CONFIG")
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
            let text = toml::to_string_pretty(&PalaverConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PALAVER_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PALAVER_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Ok(v) = std::env::var("PALAVER_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("PALAVER_LIMITS__MAX_CONNECTIONS") {
            if let Ok(n) = v.parse() {
                self.limits.max_connections = n;
            }
        }
    }
}
