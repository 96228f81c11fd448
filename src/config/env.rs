use crate::config::DEFAULT_API_HOST;
use crate::utils::error::{HarnessError, Result};
use std::path::PathBuf;

pub const API_HOST_VAR: &str = "API_HOST";
pub const API_TOKEN_VAR: &str = "API_TOKEN";
pub const MUSIC_DIR_VAR: &str = "MUSIC_DIR";
pub const UPLOADS_DIR_VAR: &str = "UPLOADS_DIR";

/// API 連線設定，來源為環境變數
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub host: String,
    pub token: String,
    pub music_dir: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub storage_owner: Option<String>,
}

impl ApiSettings {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            music_dir: None,
            uploads_dir: None,
            storage_owner: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 缺少 API_TOKEN 時立即失敗；API_HOST 有預設值
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get(API_TOKEN_VAR).ok_or_else(|| HarnessError::MissingConfigError {
            field: API_TOKEN_VAR.to_string(),
        })?;

        let host = get(API_HOST_VAR).unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        Ok(Self {
            host: normalize_host(&host),
            token,
            music_dir: get(MUSIC_DIR_VAR).map(PathBuf::from),
            uploads_dir: get(UPLOADS_DIR_VAR).map(PathBuf::from),
            storage_owner: None,
        })
    }

    /// 日誌中只顯示 token 前 20 字元
    pub fn masked_token(&self) -> String {
        if self.token.chars().count() > 20 {
            let prefix: String = self.token.chars().take(20).collect();
            format!("{}...", prefix)
        } else {
            self.token.clone()
        }
    }
}

pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}
