use crate::adapters::FragmentClient;
use crate::config::PollerSettings;
use crate::core::poller::{PollReport, ProgressPoller};
use crate::core::relay::{RelayConfig, ThrottlingRelay};
use crate::domain::model::UploadAccepted;
use crate::utils::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Accepted(UploadAccepted),
    Rejected { status: Option<u16>, message: String },
}

#[derive(Debug, Clone)]
pub struct UploadWatchReport {
    pub file: PathBuf,
    pub upload: UploadOutcome,
    pub upload_elapsed: Duration,
    pub poll: Option<PollReport>,
}

impl UploadWatchReport {
    pub fn upload_id(&self) -> Option<&str> {
        match &self.upload {
            UploadOutcome::Accepted(accepted) => accepted.id.as_deref(),
            UploadOutcome::Rejected { .. } => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.upload, UploadOutcome::Accepted(_))
            && self.poll.as_ref().map_or(true, |poll| poll.outcome.is_success())
    }

    pub fn summary(&self) -> String {
        match &self.upload {
            UploadOutcome::Rejected { status: Some(status), .. } => format!("FAILED - {}", status),
            UploadOutcome::Rejected { message, .. } => format!("ERROR - {}", message),
            UploadOutcome::Accepted(_) => match &self.poll {
                Some(poll) if !poll.outcome.is_success() => {
                    format!("UPLOADED, server processing {}", poll.outcome.label())
                }
                _ => "SUCCESS".to_string(),
            },
        }
    }
}

/// 背景上傳檔案（可經過節流 relay），拿到 upload ID 後輪詢伺服器端進度。
///
/// 上傳 task 的 `JoinHandle` 就是結果本身，不需要共用旗標。
pub struct UploadWatch {
    client: FragmentClient,
    poller: PollerSettings,
    relay: Option<RelayConfig>,
    wait_tick: Duration,
}

impl UploadWatch {
    pub fn new(client: FragmentClient, poller: PollerSettings) -> Self {
        Self {
            client,
            poller,
            relay: None,
            wait_tick: Duration::from_secs(2),
        }
    }

    pub fn through_relay(mut self, config: RelayConfig) -> Self {
        self.relay = Some(config);
        self
    }

    pub fn with_wait_tick(mut self, tick: Duration) -> Self {
        self.wait_tick = tick;
        self
    }

    pub async fn run(&self, file: &Path, entity_id: &str) -> Result<UploadWatchReport> {
        let size = tokio::fs::metadata(file).await?.len();
        tracing::info!("🎧 Testing: {}", file.display());
        tracing::info!("Size: {:.2}MB", size as f64 / (1024.0 * 1024.0));

        let relay = match &self.relay {
            Some(config) => Some(ThrottlingRelay::new(config.clone()).start().await?),
            None => None,
        };

        let upload_client = match &relay {
            Some(handle) => self.client.rebased(handle.base_url())?,
            None => self.client.clone(),
        };

        let report = self.watch(upload_client, file, entity_id).await;

        if let Some(handle) = relay {
            handle.shutdown().await;
        }

        let report = report?;
        tracing::info!("FINAL RESULT: {}", report.summary());
        Ok(report)
    }

    async fn watch(&self, upload_client: FragmentClient, file: &Path, entity_id: &str) -> Result<UploadWatchReport> {
        let started = Instant::now();
        let path = file.to_path_buf();
        let entity = entity_id.to_string();

        tracing::info!("Starting upload request...");
        let mut upload = tokio::spawn(async move { upload_client.upload_file(&entity, &path).await });

        let mut ticker = tokio::time::interval(self.wait_tick);
        ticker.tick().await;
        let mut waits: u32 = 0;

        let joined = loop {
            tokio::select! {
                joined = &mut upload => break joined,
                _ = ticker.tick() => {
                    waits += 1;
                    tracing::info!(
                        "[{:2}] {:5.1}s - Waiting for server response...",
                        waits,
                        started.elapsed().as_secs_f64()
                    );
                }
            }
        };
        let upload_elapsed = started.elapsed();

        let result = joined.map_err(|e| HarnessError::flow("upload", format!("upload task failed: {}", e)))?;

        let upload = match result {
            Ok(accepted) => {
                tracing::info!(
                    "✅ Upload completed in {:.1}s - ID: {}",
                    upload_elapsed.as_secs_f64(),
                    accepted.id.as_deref().unwrap_or("<none>")
                );
                UploadOutcome::Accepted(accepted)
            }
            Err(e) => {
                tracing::error!("❌ Upload failed: {}", e);
                UploadOutcome::Rejected {
                    status: e.status_code(),
                    message: e.to_string(),
                }
            }
        };

        let mut report = UploadWatchReport {
            file: file.to_path_buf(),
            upload,
            upload_elapsed,
            poll: None,
        };

        if let Some(upload_id) = report.upload_id().map(|id| id.to_string()) {
            tracing::info!("Got upload ID: {}", upload_id);
            tracing::info!("Starting server progress monitoring...");
            let poller = ProgressPoller::from_settings(self.client.clone(), &self.poller);
            report.poll = Some(poller.poll(&upload_id).await);
        }

        Ok(report)
    }
}
