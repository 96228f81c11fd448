use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const FRAGMENT_SNAPSHOT_FILE: &str = "soundfragment_data.json";
pub const GENRES_SNAPSHOT_FILE: &str = "genres.json";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

/// 以縮排 JSON 寫出快照
pub async fn save_snapshot<S: Storage, T: Serialize + ?Sized>(storage: &S, path: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    storage.write_file(path, json.as_bytes()).await?;
    tracing::info!("💾 Saved snapshot to {}", path);
    Ok(())
}

pub async fn load_snapshot<S: Storage, T: serde::de::DeserializeOwned>(storage: &S, path: &str) -> Result<T> {
    let data = storage.read_file(path).await?;
    Ok(serde_json::from_slice(&data)?)
}
