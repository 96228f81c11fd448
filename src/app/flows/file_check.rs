use crate::adapters::storage::load_snapshot;
use crate::adapters::FragmentClient;
use crate::app::flows::report::FlowReport;
use crate::domain::model::SoundFragment;
use crate::domain::ports::Storage;
use crate::utils::error::{HarnessError, Result};

/// GET files/{entityId}/{filename}，404 會特別註明
pub async fn check_file(client: &FragmentClient, entity_id: &str, filename: &str) -> FlowReport {
    let mut report = FlowReport::new("file check");
    record_download(&mut report, client, entity_id, filename).await;
    report
}

/// 讀取 upsert 留下的快照，逐一請求其中的附檔
pub async fn check_snapshot_files<S: Storage>(client: &FragmentClient, storage: &S, path: &str) -> Result<FlowReport> {
    let fragment: SoundFragment = load_snapshot(storage, path).await?;
    let entity_id = fragment
        .id
        .clone()
        .ok_or_else(|| HarnessError::flow("snapshot", "snapshot fragment has no id"))?;

    let mut report = FlowReport::new("snapshot file check");
    if fragment.uploaded_files.is_empty() {
        report.fail("files", format!("fragment {} has no uploaded files", entity_id));
        return Ok(report);
    }

    for file in &fragment.uploaded_files {
        match file.file_original_name.as_deref() {
            Some(name) => record_download(&mut report, client, &entity_id, name).await,
            None => report.fail("file", "uploaded file entry without a name"),
        }
    }
    Ok(report)
}

async fn record_download(report: &mut FlowReport, client: &FragmentClient, entity_id: &str, filename: &str) {
    let step = format!("GET {}/{}", entity_id, filename);
    match client.get_file(entity_id, filename).await {
        Ok(download) => report.pass(
            step,
            format!(
                "{} bytes, {}",
                download.len(),
                download.content_type.as_deref().unwrap_or("unknown type")
            ),
        ),
        Err(e) if e.is_not_found() => report.fail(step, "404 Not Found - file is not stored for this entity"),
        Err(e) => report.fail(step, e.to_string()),
    }
}
