use crate::config::PollerSettings;
use crate::domain::model::{UploadPhase, UploadProgress};
use crate::domain::ports::{ProgressResponse, ProgressSource};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// 輪詢結束的原因
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Finished(UploadProgress),
    Failed(UploadProgress),
    NotFound,
    HttpStatus { status: u16, body: String },
    RequestFailed(String),
    TimedOut,
    Cancelled,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Finished(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Finished(_) => "finished",
            PollOutcome::Failed(_) => "error",
            PollOutcome::NotFound => "not found",
            PollOutcome::HttpStatus { .. } => "http error",
            PollOutcome::RequestFailed(_) => "request failed",
            PollOutcome::TimedOut => "timed out",
            PollOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub polls: u32,
    pub elapsed: Duration,
    pub last_progress: Option<UploadProgress>,
}

/// 固定間隔輪詢上傳進度，直到 finished / error / 404 為止。
///
/// 沒有設定 deadline 時會一直輪詢下去；`with_deadline` 與 `poll_with_cancel`
/// 提供明確的停止條件。
pub struct ProgressPoller<S: ProgressSource> {
    source: S,
    interval: Duration,
    deadline: Option<Duration>,
}

impl<S: ProgressSource> ProgressPoller<S> {
    pub fn new(source: S) -> Self {
        let defaults = PollerSettings::default();
        Self {
            source,
            interval: defaults.interval,
            deadline: defaults.deadline,
        }
    }

    pub fn from_settings(source: S, settings: &PollerSettings) -> Self {
        Self {
            source,
            interval: settings.interval,
            deadline: settings.deadline,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn poll(&self, upload_id: &str) -> PollReport {
        self.run(upload_id, None).await
    }

    /// `cancel` 變成 true 時停止
    pub async fn poll_with_cancel(&self, upload_id: &str, cancel: watch::Receiver<bool>) -> PollReport {
        self.run(upload_id, Some(cancel)).await
    }

    async fn run(&self, upload_id: &str, mut cancel: Option<watch::Receiver<bool>>) -> PollReport {
        let started = Instant::now();
        let deadline_at = self.deadline.map(|deadline| started + deadline);
        let mut polls: u32 = 0;
        let mut last_percentage: Option<u32> = None;
        let mut last_progress: Option<UploadProgress> = None;

        let outcome = loop {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                break PollOutcome::Cancelled;
            }
            if deadline_at.is_some_and(|at| Instant::now() >= at) {
                tracing::warn!("⏰ Gave up polling {} after {:?}", upload_id, started.elapsed());
                break PollOutcome::TimedOut;
            }

            polls += 1;
            let elapsed = started.elapsed().as_secs_f64();

            match self.source.fetch_progress(upload_id).await {
                Ok(ProgressResponse::NotFound) => {
                    tracing::info!("[{:2}] {:5.1}s - Server: Upload session not found (404)", polls, elapsed);
                    break PollOutcome::NotFound;
                }
                Ok(ProgressResponse::Status { status, body }) => {
                    let excerpt: String = body.chars().take(200).collect();
                    tracing::warn!("[{:2}] {:5.1}s - Server: HTTP {} {}", polls, elapsed, status, excerpt);
                    break PollOutcome::HttpStatus { status, body };
                }
                Ok(ProgressResponse::Found(progress)) => {
                    if last_percentage != Some(progress.percentage) || polls % 10 == 1 {
                        tracing::info!(
                            "[{:2}] {:5.1}s - Server: {:3}% - {}",
                            polls,
                            elapsed,
                            progress.percentage,
                            progress.status
                        );
                        last_percentage = Some(progress.percentage);
                    }
                    last_progress = Some(progress.clone());

                    match progress.phase() {
                        UploadPhase::Finished => {
                            log_completion(&progress);
                            break PollOutcome::Finished(progress);
                        }
                        UploadPhase::Failed => {
                            log_completion(&progress);
                            break PollOutcome::Failed(progress);
                        }
                        UploadPhase::InProgress => {}
                    }
                }
                Err(e) => {
                    tracing::error!("[{:2}] Progress poll error: {}", polls, e);
                    break PollOutcome::RequestFailed(e.to_string());
                }
            }

            // 下一輪開頭會判斷是逾時還是取消
            self.wait_next(deadline_at, cancel.as_mut()).await;
        };

        PollReport {
            outcome,
            polls,
            elapsed: started.elapsed(),
            last_progress,
        }
    }

    /// 等待一個間隔，被取消或到期時提早返回
    async fn wait_next(&self, deadline_at: Option<Instant>, cancel: Option<&mut watch::Receiver<bool>>) {
        let mut wake_at = Instant::now() + self.interval;
        if let Some(at) = deadline_at {
            wake_at = wake_at.min(at);
        }
        let sleep = tokio::time::sleep_until(wake_at);
        tokio::pin!(sleep);

        let Some(rx) = cancel else {
            sleep.await;
            return;
        };

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        // 發送端已消失，之後不可能再被取消
                        sleep.await;
                        return;
                    }
                    // 只有 true 才算取消，送 false 要繼續等
                    if *rx.borrow_and_update() {
                        return;
                    }
                }
            }
        }
    }
}

fn log_completion(progress: &UploadProgress) {
    tracing::info!("Server processing completed: {}", progress.status);
    if let Some(metadata) = &progress.metadata {
        let duration = metadata
            .duration_seconds
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "?".to_string());
        let bit_rate = metadata
            .bit_rate
            .map(|b| b.to_string())
            .unwrap_or_else(|| "?".to_string());
        tracing::info!("File info: {}s, {} bps", duration, bit_rate);
    }
}
