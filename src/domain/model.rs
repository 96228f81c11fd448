use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 伺服器上的 SoundFragment，保留未知欄位以便完整寫回快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fragment_type: Option<String>,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFile>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub file_original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
}

/// 檔案上傳後伺服器回傳的內容，`id` 即上傳進度查詢用的 session ID
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadAccepted {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub percentage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UploadFileMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    InProgress,
    Finished,
    Failed,
}

impl UploadProgress {
    pub fn new(status: &str, percentage: u32) -> Self {
        Self {
            status: status.to_string(),
            percentage,
            metadata: None,
        }
    }

    pub fn phase(&self) -> UploadPhase {
        match self.status.as_str() {
            "finished" => UploadPhase::Finished,
            "error" => UploadPhase::Failed,
            _ => UploadPhase::InProgress,
        }
    }
}

fn unknown_status() -> String {
    "unknown".to_string()
}

/// 建立或更新 SoundFragment 的請求內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPayload {
    pub title: String,
    pub artist: String,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fragment_type: Option<String>,
    #[serde(default)]
    pub newly_uploaded: Vec<String>,
}

impl UpsertPayload {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            genre: genre.into(),
            album: None,
            fragment_type: None,
            newly_uploaded: Vec::new(),
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_type(mut self, fragment_type: impl Into<String>) -> Self {
        self.fragment_type = Some(fragment_type.into());
        self
    }

    pub fn with_file(mut self, filename: impl Into<String>) -> Self {
        self.newly_uploaded.push(filename.into());
        self
    }
}

/// 檔案下載結果
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub bytes: Vec<u8>,
}

impl FileDownload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 從音檔標籤讀出的欄位
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

impl AudioMetadata {
    pub fn is_empty(&self) -> bool {
        self.artist.is_none() && self.title.is_none() && self.album.is_none() && self.genre.is_none()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
