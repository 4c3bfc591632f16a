//! Configuration for the exposure engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use token_ledger::AccountId;

/// Reduction lock applied by every successful increase: 14 days
pub const DEFAULT_LOCK_SECS: u64 = 14 * 24 * 60 * 60;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Privileged account credited with the operator share of every take
    pub operator_account: String,

    /// Reduction lock window, in seconds
    pub lock_duration_secs: u64,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/exposure"),
            service_name: "exposure-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            operator_account: "operator".to_string(),
            lock_duration_secs: DEFAULT_LOCK_SECS,
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("EXPOSURE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(operator) = std::env::var("EXPOSURE_OPERATOR") {
            config.operator_account = operator;
        }

        if let Ok(secs) = std::env::var("EXPOSURE_LOCK_SECS") {
            config.lock_duration_secs = secs.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid EXPOSURE_LOCK_SECS: {}", e))
            })?;
        }

        Ok(config)
    }

    /// Operator account as an [`AccountId`]
    pub fn operator(&self) -> AccountId {
        AccountId::new(self.operator_account.clone())
    }

    /// Lock window as a [`chrono::Duration`]
    pub fn lock_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_duration_secs as i64)
    }
}
