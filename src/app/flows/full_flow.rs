use crate::adapters::FragmentClient;
use crate::app::flows::report::FlowReport;
use crate::config::PollerSettings;
use crate::core::metadata::AudioMetadataParser;
use crate::core::poller::ProgressPoller;
use crate::domain::model::UpsertPayload;
use std::path::Path;

const TEMPLATE_ID: &str = "new";
const TEMP_ENTITY: &str = "temp";

/// 完整 CRUD 流程：範本 → 上傳 → 進度 → 建立 → 讀取 → 下載 → 更新
pub struct FullFlow {
    client: FragmentClient,
    poller: PollerSettings,
    parser: AudioMetadataParser,
    upload_only: bool,
}

impl FullFlow {
    pub fn new(client: FragmentClient, poller: PollerSettings) -> Self {
        Self {
            client,
            poller,
            parser: AudioMetadataParser::new(),
            upload_only: false,
        }
    }

    pub fn upload_only(mut self, upload_only: bool) -> Self {
        self.upload_only = upload_only;
        self
    }

    pub async fn run(&self, file: &Path) -> FlowReport {
        let mut report = FlowReport::new(if self.upload_only { "upload-only" } else { "full flow" });

        if !self.upload_only {
            match self.client.get_fragment(TEMPLATE_ID, Some("en")).await {
                Ok(_) => report.pass("Template", "fetched `new` template"),
                Err(e) => {
                    report.fail("Template", e.to_string());
                    return report;
                }
            }
        }

        let file_name = match file.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => {
                report.fail("Upload", format!("not a file path: {}", file.display()));
                return report;
            }
        };

        let upload_id = match self.client.upload_file(TEMP_ENTITY, file).await {
            Ok(accepted) => match accepted.id {
                Some(id) => {
                    report.pass("Upload", format!("{} accepted as {}", file_name, id));
                    id
                }
                None => {
                    report.fail("Upload", "response carried no upload id");
                    return report;
                }
            },
            Err(e) => {
                report.fail("Upload", e.to_string());
                return report;
            }
        };

        let poll = ProgressPoller::from_settings(self.client.clone(), &self.poller)
            .poll(&upload_id)
            .await;
        if poll.outcome.is_success() {
            report.pass("Progress", format!("finished after {} polls", poll.polls));
        } else {
            report.fail("Progress", format!("ended as {}", poll.outcome.label()));
            return report;
        }

        if self.upload_only {
            return report;
        }

        let metadata = self.parser.parse(file);
        let title = metadata.title.clone().unwrap_or_else(|| file_stem(file));
        let mut payload = UpsertPayload::new(
            title.clone(),
            metadata.artist.clone().unwrap_or_else(|| "Unknown Artist".to_string()),
            metadata.genre.clone().unwrap_or_else(|| "Unknown".to_string()),
        )
        .with_type("SONG")
        .with_file(file_name.clone());
        if let Some(album) = metadata.album {
            payload = payload.with_album(album);
        }

        let entity_id = match self.client.upsert(&payload).await {
            Ok(fragment) => match fragment.id {
                Some(id) => {
                    report.pass("Upsert", format!("created {}", id));
                    id
                }
                None => {
                    report.fail("Upsert", "response carried no id");
                    return report;
                }
            },
            Err(e) => {
                report.fail("Upsert", e.to_string());
                return report;
            }
        };

        match self.client.get_fragment(&entity_id, Some("en")).await {
            Ok(fragment) => report.pass(
                "Get by ID",
                format!(
                    "{:?} with {} file(s)",
                    fragment.title.unwrap_or_default(),
                    fragment.uploaded_files.len()
                ),
            ),
            Err(e) => report.fail("Get by ID", e.to_string()),
        }

        match self.client.get_file(&entity_id, &file_name).await {
            Ok(download) => report.pass("Download", format!("{} bytes", download.len())),
            Err(e) => report.fail("Download", e.to_string()),
        }

        let mut changed = payload.clone();
        changed.title = format!("{} (updated)", title);
        changed.genre = "Updated".to_string();
        changed.newly_uploaded.clear();
        match self.client.update(&entity_id, &changed).await {
            Ok(fragment) => report.pass(
                "Update",
                format!("title now {:?}", fragment.title.unwrap_or_default()),
            ),
            Err(e) => report.fail("Update", e.to_string()),
        }

        report
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
