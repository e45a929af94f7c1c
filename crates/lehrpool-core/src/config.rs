//! Configuration system for Lehrpool.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LEHRPOOL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lehrpool/config.toml
//!   3. ~/.config/lehrpool/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::DEFAULT_CHUNK_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LehrpoolConfig {
    pub master: MasterConfig,
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Master server hostname. Also the host image downloads connect to.
    /// Empty = not configured.
    pub hostname: String,
    /// TLS port for catalog RPC.
    pub port_ssl: u16,
    /// Plain port for catalog RPC.
    pub port_plain: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes negotiated per RANGE request.
    pub chunk_size: u64,
    /// Capacity of the connection's read and write buffers.
    pub buffer_bytes: usize,
    /// Deadline for establishing the TCP connection. 0 = OS default.
    pub connect_timeout_secs: u64,
    /// Socket read/write deadline. 0 = block indefinitely.
    pub io_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where `fetch` writes images when no output path is given.
    pub download_dir: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port_ssl: 9091,
            port_plain: 9090,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_bytes: 64 * 1024,
            connect_timeout_secs: 10,
            io_timeout_secs: 0,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: data_dir().join("images"),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("lehrpool")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("lehrpool")
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

impl LehrpoolConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LehrpoolConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LEHRPOOL_CONFIG")
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
            let text = toml::to_string_pretty(&LehrpoolConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Apply LEHRPOOL_* overrides. Values that fail to parse are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("LEHRPOOL_MASTER__HOSTNAME") {
            self.master.hostname = v;
        }
        if let Some(p) = var("LEHRPOOL_MASTER__PORT_SSL").and_then(|v| v.parse().ok()) {
            self.master.port_ssl = p;
        }
        if let Some(p) = var("LEHRPOOL_MASTER__PORT_PLAIN").and_then(|v| v.parse().ok()) {
            self.master.port_plain = p;
        }
        if let Some(n) = var("LEHRPOOL_TRANSFER__CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.transfer.chunk_size = n;
        }
        if let Some(n) = var("LEHRPOOL_TRANSFER__IO_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.transfer.io_timeout_secs = n;
        }
        if let Some(v) = var("LEHRPOOL_STORAGE__DOWNLOAD_DIR") {
            self.storage.download_dir = PathBuf::from(v);
        }
    }
}
