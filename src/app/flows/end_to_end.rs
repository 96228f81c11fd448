use crate::adapters::FragmentClient;
use crate::app::flows::report::FlowReport;
use crate::config::ApiSettings;
use crate::domain::model::{SoundFragment, UpsertPayload};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TEMP_ENTITY: &str = "temp";
const MIN_DOWNLOAD_BYTES: usize = 1000;

/// 上傳 → 建立 fragment → 讀回 → 依 ID 下載 → 檢查檔案系統。
///
/// 前一步失敗時不再執行依賴它的步驟。
pub struct EndToEndFlow {
    client: FragmentClient,
    uploads_dir: Option<PathBuf>,
    storage_owner: Option<String>,
    settle: Duration,
}

impl EndToEndFlow {
    pub fn new(client: FragmentClient, settings: &ApiSettings) -> Self {
        Self {
            client,
            uploads_dir: settings.uploads_dir.clone(),
            storage_owner: settings.storage_owner.clone(),
            settle: Duration::from_secs(2),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub async fn run(&self, file: &Path) -> FlowReport {
        let mut report = FlowReport::new("end-to-end");
        tracing::info!("🚀 Starting end-to-end flow against {}", self.client.base_url());

        let Some(file_name) = self.upload(&mut report, file).await else {
            return report;
        };
        let Some(entity_id) = self.create(&mut report, &file_name).await else {
            return report;
        };

        tracing::info!("Waiting {:?} for processing to complete...", self.settle);
        tokio::time::sleep(self.settle).await;

        let Some(fragment) = self.retrieve(&mut report, &entity_id).await else {
            return report;
        };

        self.download_first(&mut report, &fragment).await;
        self.check_filesystem(&mut report, &entity_id, &file_name).await;
        report
    }

    async fn upload(&self, report: &mut FlowReport, file: &Path) -> Option<String> {
        let file_name = file.file_name()?.to_string_lossy().to_string();
        match self.client.upload_file(TEMP_ENTITY, file).await {
            Ok(accepted) => {
                report.pass(
                    "File Upload",
                    format!("{} (upload id {})", file_name, accepted.id.as_deref().unwrap_or("-")),
                );
                Some(file_name)
            }
            Err(e) => {
                report.fail("File Upload", e.to_string());
                None
            }
        }
    }

    async fn create(&self, report: &mut FlowReport, file_name: &str) -> Option<String> {
        let payload = UpsertPayload::new("End-to-End Test Fragment", "Test Artist", "Test Genre")
            .with_album("Test Album")
            .with_file(file_name);

        match self.client.upsert(&payload).await {
            Ok(SoundFragment { id: Some(id), .. }) => {
                report.pass("SoundFragment Creation", format!("id {}", id));
                Some(id)
            }
            Ok(_) => {
                report.fail("SoundFragment Creation", "response carried no id");
                None
            }
            Err(e) => {
                report.fail("SoundFragment Creation", e.to_string());
                None
            }
        }
    }

    async fn retrieve(&self, report: &mut FlowReport, entity_id: &str) -> Option<SoundFragment> {
        match self.client.get_fragment(entity_id, None).await {
            Ok(fragment) if !fragment.uploaded_files.is_empty() => {
                for (i, file) in fragment.uploaded_files.iter().enumerate() {
                    tracing::info!(
                        "File {}: id={:?} name={:?} mime={:?} storage={:?} key={:?}",
                        i + 1,
                        file.id,
                        file.file_original_name,
                        file.mime_type,
                        file.storage_type,
                        file.file_key
                    );
                }
                report.pass(
                    "File Metadata Retrieval",
                    format!("{} uploaded file(s)", fragment.uploaded_files.len()),
                );
                Some(fragment)
            }
            Ok(_) => {
                report.fail("File Metadata Retrieval", "no uploaded files found in response");
                None
            }
            Err(e) => {
                report.fail("File Metadata Retrieval", e.to_string());
                None
            }
        }
    }

    async fn download_first(&self, report: &mut FlowReport, fragment: &SoundFragment) {
        let Some(file_id) = fragment.uploaded_files.first().and_then(|f| f.id.clone()) else {
            report.fail("File Access by UUID", "first uploaded file has no id");
            return;
        };

        match self.client.get_file_by_id(&file_id).await {
            Ok(download) if download.len() > MIN_DOWNLOAD_BYTES => report.pass(
                "File Access by UUID",
                format!(
                    "{} bytes, {}",
                    download.len(),
                    download.content_type.as_deref().unwrap_or("unknown")
                ),
            ),
            Ok(download) => report.fail(
                "File Access by UUID",
                format!("file content seems too small ({} bytes)", download.len()),
            ),
            Err(e) => report.fail("File Access by UUID", e.to_string()),
        }
    }

    async fn check_filesystem(&self, report: &mut FlowReport, entity_id: &str, file_name: &str) {
        let Some(expected) = self.stored_path(entity_id, file_name) else {
            // 沒有 UPLOADS_DIR 就無法確認檔案落地，不能算通過
            report.fail("File System Storage", "UPLOADS_DIR not set, stored file not verified");
            return;
        };

        match tokio::fs::metadata(&expected).await {
            Ok(meta) => report.pass(
                "File System Storage",
                format!("{} ({} bytes)", expected.display(), meta.len()),
            ),
            Err(_) => {
                let still_in_temp = self
                    .stored_path(TEMP_ENTITY, file_name)
                    .is_some_and(|temp| temp.exists());
                let detail = if still_in_temp {
                    format!("not found at {}, file is still in temp", expected.display())
                } else {
                    format!("not found at {}", expected.display())
                };
                report.fail("File System Storage", detail);
            }
        }
    }

    /// UPLOADS_DIR/[owner/]{entityId}/{file}
    pub fn stored_path(&self, entity_id: &str, file_name: &str) -> Option<PathBuf> {
        let mut path = self.uploads_dir.clone()?;
        if let Some(owner) = &self.storage_owner {
            path.push(owner);
        }
        path.push(entity_id);
        path.push(file_name);
        Some(path)
    }
}
