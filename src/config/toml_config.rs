use crate::config::env::{normalize_host, ApiSettings, API_HOST_VAR, API_TOKEN_VAR, MUSIC_DIR_VAR, UPLOADS_DIR_VAR};
use crate::config::{HarnessSettings, PollerSettings, RelaySettings, DEFAULT_API_HOST};
use crate::utils::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `harness.toml` 的內容，所有欄位皆為選填
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub api: Option<ApiSection>,
    pub poller: Option<PollerSection>,
    pub relay: Option<RelaySection>,
    pub paths: Option<PathsSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub host: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollerSection {
    pub interval_ms: Option<u64>,
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaySection {
    pub listen_port: Option<u16>,
    pub bandwidth_kbps: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub response_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsSection {
    pub music_dir: Option<String>,
    pub uploads_dir: Option<String>,
    pub storage_owner: Option<String>,
    pub snapshot_dir: Option<String>,
}

impl HarnessConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HarnessError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| HarnessError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_TOKEN})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| HarnessError::config(format!("Invalid placeholder pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 檔案值優先，其次是環境變數，最後是預設值
    pub fn resolve<F>(&self, lookup: F) -> Result<HarnessSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let api = self.api.clone().unwrap_or_default();
        let paths = self.paths.clone().unwrap_or_default();
        let poller = self.poller.clone().unwrap_or_default();
        let relay = self.relay.clone().unwrap_or_default();

        let token = file_value(api.token)
            .or_else(|| env(API_TOKEN_VAR))
            .ok_or_else(|| HarnessError::MissingConfigError {
                field: API_TOKEN_VAR.to_string(),
            })?;
        let host = file_value(api.host)
            .or_else(|| env(API_HOST_VAR))
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let api = ApiSettings {
            host: normalize_host(&host),
            token,
            music_dir: file_value(paths.music_dir)
                .or_else(|| env(MUSIC_DIR_VAR))
                .map(PathBuf::from),
            uploads_dir: file_value(paths.uploads_dir)
                .or_else(|| env(UPLOADS_DIR_VAR))
                .map(PathBuf::from),
            storage_owner: file_value(paths.storage_owner),
        };

        let poller_defaults = PollerSettings::default();
        let relay_defaults = RelaySettings::default();

        Ok(HarnessSettings {
            api,
            poller: PollerSettings {
                interval: poller
                    .interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(poller_defaults.interval),
                deadline: poller.deadline_secs.map(Duration::from_secs),
            },
            relay: RelaySettings {
                listen_port: relay.listen_port.unwrap_or(relay_defaults.listen_port),
                bandwidth_kbps: relay.bandwidth_kbps.unwrap_or(relay_defaults.bandwidth_kbps),
                connect_timeout: relay
                    .connect_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(relay_defaults.connect_timeout),
                response_timeout: relay
                    .response_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(relay_defaults.response_timeout),
            },
            snapshot_dir: file_value(paths.snapshot_dir)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// 空字串或未替換的 ${VAR} 視為未設定
fn file_value(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && !v.contains("${"))
}
