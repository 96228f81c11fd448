#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

pub use env::ApiSettings;
pub use toml_config::HarnessConfig;

use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_HOST: &str = "http://localhost:38707";

/// 1 GiB/s，再高就等於沒有節流
pub const MAX_BANDWIDTH_KBPS: u64 = 1_048_576;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub listen_port: u16,
    pub bandwidth_kbps: u64,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            listen_port: 8888,
            bandwidth_kbps: 50,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl RelaySettings {
    pub fn bandwidth_bytes_per_sec(&self) -> u64 {
        self.bandwidth_kbps.saturating_mul(1024)
    }
}

/// 合併後的完整設定
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub api: ApiSettings,
    pub poller: PollerSettings,
    pub relay: RelaySettings,
    pub snapshot_dir: PathBuf,
}

impl HarnessSettings {
    pub fn from_api(api: ApiSettings) -> Self {
        Self {
            api,
            poller: PollerSettings::default(),
            relay: RelaySettings::default(),
            snapshot_dir: PathBuf::from("."),
        }
    }

    /// 有設定檔時以檔案為主，否則只讀環境變數
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                HarnessConfig::from_file(path)?.resolve(|key| std::env::var(key).ok())
            }
            None => Ok(Self::from_api(ApiSettings::from_env()?)),
        }
    }
}

impl Validate for HarnessSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("api.host", &self.api.host)?;
        validation::validate_non_empty_string("api.token", &self.api.token)?;
        if let Some(owner) = &self.api.storage_owner {
            validation::validate_path_segment("paths.storage_owner", owner)?;
        }
        validation::validate_duration(
            "poller.interval_ms",
            self.poller.interval,
            Duration::from_millis(10),
            Duration::from_secs(60),
        )?;
        if let Some(deadline) = self.poller.deadline {
            validation::validate_positive_number("poller.deadline_secs", deadline.as_secs(), 1)?;
        }
        validation::validate_number_range("relay.bandwidth_kbps", self.relay.bandwidth_kbps, 1, MAX_BANDWIDTH_KBPS)?;
        validation::validate_positive_number(
            "relay.response_timeout_secs",
            self.relay.response_timeout.as_millis() as u64,
            1,
        )?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
