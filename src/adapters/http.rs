use crate::config::ApiSettings;
use crate::domain::model::{FileDownload, SoundFragment, UploadAccepted, UploadProgress, UpsertPayload};
use crate::domain::ports::{ProgressResponse, ProgressSource};
use crate::utils::error::{HarnessError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// 列表查詢參數
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
    pub source_type: String,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            source_type: "LOCAL".to_string(),
        }
    }
}

/// Sound fragment API 的 HTTP 客戶端，每個請求都帶 bearer token
#[derive(Debug, Clone)]
pub struct FragmentClient {
    client: Client,
    base_url: String,
    token: String,
}

impl FragmentClient {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        Self::with_base_url(settings.host.clone(), settings.token.clone())
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        // 提早檢查 URL，避免每次請求才失敗
        Url::parse(&base_url)?;

        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// 同一組憑證改連另一個位址（例如本機的節流 relay）
    pub fn rebased(&self, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)?;
        Ok(Self {
            client: self.client.clone(),
            base_url,
            token: self.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| HarnessError::config(format!("API host cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("❌ {} answered {}: {}", url, status, body);
        Err(HarnessError::HttpStatus {
            status: status.as_u16(),
            url,
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await?;
        tracing::debug!("Response body: {}", body);
        Ok(serde_json::from_str(&body)?)
    }

    /// POST /api/soundfragments/files/{entityId}，multipart 欄位名為 `file`
    pub async fn upload_file(&self, entity_id: &str, path: &Path) -> Result<UploadAccepted> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| HarnessError::config(format!("Not a file path: {}", path.display())))?
            .to_string();

        let data = tokio::fs::read(path).await?;
        let size = data.len();
        let part = Part::bytes(data)
            .file_name(filename.clone())
            .mime_str(guess_mime(path))?;
        let form = Form::new().part("file", part);

        let url = self.endpoint(&["api", "soundfragments", "files", entity_id])?;
        tracing::info!("📤 Uploading {} ({} bytes) to {}", filename, size, url);

        let response = self
            .authorized(self.client.post(url))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(UploadAccepted::default());
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// GET /api/soundfragments/upload-progress/{uploadId}
    pub async fn upload_progress(&self, upload_id: &str) -> Result<ProgressResponse> {
        let url = self.endpoint(&["api", "soundfragments", "upload-progress", upload_id])?;
        let response = self
            .authorized(self.client.get(url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ProgressResponse::NotFound),
            status if status.is_success() => {
                let progress: UploadProgress = Self::read_json(response).await?;
                Ok(ProgressResponse::Found(progress))
            }
            status => Ok(ProgressResponse::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// POST /api/soundfragments，建立新的 fragment
    pub async fn upsert(&self, payload: &UpsertPayload) -> Result<SoundFragment> {
        let url = self.endpoint(&["api", "soundfragments"])?;
        self.post_fragment(url, payload).await
    }

    /// POST /api/soundfragments/{id}，更新既有的 fragment
    pub async fn update(&self, entity_id: &str, payload: &UpsertPayload) -> Result<SoundFragment> {
        let url = self.endpoint(&["api", "soundfragments", entity_id])?;
        self.post_fragment(url, payload).await
    }

    async fn post_fragment(&self, url: Url, payload: &UpsertPayload) -> Result<SoundFragment> {
        tracing::debug!("POST {} {}", url, serde_json::to_string(payload)?);
        let response = self
            .authorized(self.client.post(url))
            .json(payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        Self::read_json(response).await
    }

    /// GET /api/soundfragments/{id}；`new` 會回傳空白範本
    pub async fn get_fragment(&self, id: &str, lang: Option<&str>) -> Result<SoundFragment> {
        let url = self.endpoint(&["api", "soundfragments", id])?;
        let mut request = self.authorized(self.client.get(url)).timeout(REQUEST_TIMEOUT);
        if let Some(lang) = lang {
            request = request.query(&[("lang", lang)]);
        }
        let response = Self::ensure_success(request.send().await?).await?;
        Self::read_json(response).await
    }

    pub async fn list_fragments(&self, query: &ListQuery) -> Result<Vec<SoundFragment>> {
        let url = self.endpoint(&["api", "soundfragments"])?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
                ("sourceType", query.source_type.clone()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let value: serde_json::Value = Self::read_json(response).await?;
        extract_entries(value)
    }

    /// GET /api/soundfragments/files/{entityId}/{filename}
    pub async fn get_file(&self, entity_id: &str, filename: &str) -> Result<FileDownload> {
        let url = self.endpoint(&["api", "soundfragments", "files", entity_id, filename])?;
        self.download(url).await
    }

    /// GET /api/sound-fragments/file/{fileId}
    pub async fn get_file_by_id(&self, file_id: &str) -> Result<FileDownload> {
        let url = self.endpoint(&["api", "sound-fragments", "file", file_id])?;
        self.download(url).await
    }

    async fn download(&self, url: Url) -> Result<FileDownload> {
        tracing::debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(url))
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let content_length = response.content_length();
        let bytes = response.bytes().await?.to_vec();

        Ok(FileDownload {
            status,
            content_type,
            content_length,
            bytes,
        })
    }

    /// GET /api/genres，回傳排序且不重複的名稱
    pub async fn genres(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["api", "genres"])?;
        tracing::info!("🎵 Fetching genres from {}", url);
        let response = self
            .authorized(self.client.get(url))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let value: serde_json::Value = Self::read_json(response).await?;
        Ok(genre_names(&value))
    }
}

#[async_trait]
impl ProgressSource for FragmentClient {
    async fn fetch_progress(&self, upload_id: &str) -> Result<ProgressResponse> {
        self.upload_progress(upload_id).await
    }
}

pub fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// 列表回應可能是 `payload.viewData.entries` 或直接是陣列
pub fn extract_entries(value: serde_json::Value) -> Result<Vec<SoundFragment>> {
    let entries = match value.pointer("/payload/viewData/entries") {
        Some(entries) => entries.clone(),
        None if value.is_array() => value,
        None => {
            tracing::warn!("⚠️ Unexpected list response shape");
            return Ok(Vec::new());
        }
    };
    Ok(serde_json::from_value(entries)?)
}

/// 接受字串陣列或含 `name` 的物件陣列
pub fn genre_names(value: &serde_json::Value) -> Vec<String> {
    let names: BTreeSet<String> = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(name) => Some(name.clone()),
                    serde_json::Value::Object(obj) => obj
                        .get("name")
                        .and_then(|name| name.as_str())
                        .map(|name| name.to_string()),
                    _ => None,
                })
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        tracing::warn!("⚠️ No genre names found or API returned an unexpected format");
    }
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a.MP3")), "audio/mpeg");
        assert_eq!(guess_mime(Path::new("dir/b.wav")), "audio/wav");
        assert_eq!(guess_mime(Path::new("c")), "application/octet-stream");
    }

    #[test]
    fn test_genre_names_from_objects_and_strings() {
        let value = json!([{"name": "Jazz"}, {"name": "Funk"}, {"name": ""}, {"id": 3}]);
        assert_eq!(genre_names(&value), vec!["Funk", "Jazz"]);

        let value = json!(["Rock", "Pop", "Rock", ""]);
        assert_eq!(genre_names(&value), vec!["Pop", "Rock"]);

        assert!(genre_names(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_extract_entries_shapes() {
        let nested = json!({"payload": {"viewData": {"entries": [{"title": "a", "artist": "b"}]}}});
        let entries = extract_entries(nested).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].artist.as_deref(), Some("b"));

        let bare = json!([{"title": "x"}, {"title": "y"}]);
        assert_eq!(extract_entries(bare).unwrap().len(), 2);

        assert!(extract_entries(json!("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_escapes_file_names() {
        let client = FragmentClient::with_base_url("http://localhost:38707/", "t").unwrap();
        let url = client
            .endpoint(&["api", "soundfragments", "files", "temp", "my song.wav"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:38707/api/soundfragments/files/temp/my%20song.wav"
        );
    }
}
