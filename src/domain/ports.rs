use crate::domain::model::UploadProgress;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 單次上傳進度查詢的結果
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressResponse {
    Found(UploadProgress),
    NotFound,
    Status { status: u16, body: String },
}

#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch_progress(&self, upload_id: &str) -> Result<ProgressResponse>;
}
