use crate::adapters::FragmentClient;
use crate::app::flows::full_flow::file_stem;
use crate::core::metadata::AudioMetadataParser;
use crate::domain::model::UpsertPayload;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BatchUploadSummary {
    pub found: usize,
    pub created: Vec<String>,
    pub failed: Vec<(PathBuf, String)>,
}

/// 把目錄下的 mp3 逐一上傳並建立 fragment，單一檔案失敗時跳過繼續
pub struct BatchUpload {
    client: FragmentClient,
    parser: AudioMetadataParser,
    entity_id: String,
    limit: usize,
    default_artist: String,
    default_genre: String,
}

impl BatchUpload {
    pub fn new(client: FragmentClient, default_artist: impl Into<String>, default_genre: impl Into<String>) -> Self {
        Self {
            client,
            parser: AudioMetadataParser::new(),
            entity_id: "temp".to_string(),
            limit: 30,
            default_artist: default_artist.into(),
            default_genre: default_genre.into(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }

    pub async fn run(&self, dir: &Path) -> Result<BatchUploadSummary> {
        let files = collect_mp3s(dir, self.limit).await?;
        let mut summary = BatchUploadSummary {
            found: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            tracing::warn!("⚠️ No MP3 files found in {}", dir.display());
            return Ok(summary);
        }
        tracing::info!("📂 Found {} MP3 files in {}", files.len(), dir.display());

        for path in files {
            tracing::info!("Processing file: {}", path.display());
            match self.process(&path).await {
                Ok(id) => summary.created.push(id),
                Err(e) => {
                    tracing::error!("❌ Skipping {}: {}", path.display(), e);
                    summary.failed.push((path, e.to_string()));
                }
            }
        }

        tracing::info!(
            "🏁 Batch finished: {} created, {} failed",
            summary.created.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn process(&self, path: &Path) -> Result<String> {
        self.client.upload_file(&self.entity_id, path).await?;

        let payload = self.payload_for(path);
        let fragment = self.client.upsert(&payload).await?;
        let id = fragment.id.unwrap_or_default();
        tracing::info!("✅ Created fragment {} ({})", id, payload.title);
        Ok(id)
    }

    /// 標籤沒有的欄位：標題用檔名，artist/genre 用指令列給的預設值
    pub fn payload_for(&self, path: &Path) -> UpsertPayload {
        let metadata = self.parser.parse(path);
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut payload = UpsertPayload::new(
            metadata.title.unwrap_or_else(|| file_stem(path)),
            metadata.artist.unwrap_or_else(|| self.default_artist.clone()),
            metadata.genre.unwrap_or_else(|| self.default_genre.clone()),
        )
        .with_type("SONG")
        .with_file(filename);
        if let Some(album) = metadata.album {
            payload = payload.with_album(album);
        }
        payload
    }
}

/// 依檔名排序，取前 `limit` 個
pub async fn collect_mp3s(dir: &Path, limit: usize) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_mp3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    files.truncate(limit);
    Ok(files)
}
