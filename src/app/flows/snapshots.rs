use crate::adapters::storage::save_snapshot;
use crate::adapters::FragmentClient;
use crate::domain::model::{SoundFragment, UpsertPayload};
use crate::domain::ports::Storage;
use crate::utils::error::Result;

/// 抓取 genres 並寫入快照（預設 genres.json）；沒有任何 genre 時寫入空陣列
pub async fn save_genres<S: Storage>(client: &FragmentClient, storage: &S, path: &str) -> Result<Vec<String>> {
    let names = client.genres().await?;
    if names.is_empty() {
        tracing::warn!("⚠️ No genres returned, writing an empty list");
    } else {
        tracing::info!("🎵 {} genres fetched", names.len());
    }
    save_snapshot(storage, path, &names).await?;
    Ok(names)
}

/// 建立（或以 `entity_id` 更新）fragment，回應寫入快照（預設 soundfragment_data.json）
pub async fn upsert_with_snapshot<S: Storage>(
    client: &FragmentClient,
    storage: &S,
    path: &str,
    payload: &UpsertPayload,
    entity_id: Option<&str>,
) -> Result<SoundFragment> {
    let fragment = match entity_id {
        Some(id) => client.update(id, payload).await?,
        None => client.upsert(payload).await?,
    };
    tracing::info!(
        "📝 Fragment {} saved ({} files)",
        fragment.id.as_deref().unwrap_or("<no id>"),
        fragment.uploaded_files.len()
    );
    save_snapshot(storage, path, &fragment).await?;
    Ok(fragment)
}
