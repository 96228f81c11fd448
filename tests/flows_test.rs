use fragment_harness::adapters::storage::{FRAGMENT_SNAPSHOT_FILE, GENRES_SNAPSHOT_FILE};
use fragment_harness::app::flows::{self, BatchUpload, EndToEndFlow, FullFlow};
use fragment_harness::config::PollerSettings;
use fragment_harness::domain::model::UpsertPayload;
use fragment_harness::{ApiSettings, FragmentClient, LocalStorage};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn client_for(server: &MockServer) -> FragmentClient {
    FragmentClient::with_base_url(server.base_url(), "flow-token").unwrap()
}

#[tokio::test]
async fn test_end_to_end_flow_all_steps_pass() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).json_body(json!({"id": "u-1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/soundfragments")
                .body_contains("\"newlyUploaded\":[\"lala.mp3\"]");
            then.status(200).json_body(json!({"id": "frag-1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/frag-1");
            then.status(200).json_body(json!({
                "id": "frag-1",
                "uploadedFiles": [{"id": "file-9", "fileOriginalName": "lala.mp3", "mimeType": "audio/mpeg"}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/sound-fragments/file/file-9");
            then.status(200).header("content-type", "audio/mpeg").body(vec![0u8; 4096]);
        })
        .await;

    let uploads = TempDir::new()?;
    let stored = uploads.path().join("nuno").join("frag-1");
    std::fs::create_dir_all(&stored)?;
    std::fs::write(stored.join("lala.mp3"), b"stored")?;

    let music = TempDir::new()?;
    let file = music.path().join("lala.mp3");
    std::fs::write(&file, vec![3u8; 2048])?;

    let mut settings = ApiSettings::new(server.base_url(), "flow-token");
    settings.uploads_dir = Some(uploads.path().to_path_buf());
    settings.storage_owner = Some("nuno".to_string());

    let report = EndToEndFlow::new(client_for(&server), &settings)
        .with_settle(Duration::ZERO)
        .run(&file)
        .await;

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.steps.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_flow_without_uploads_dir_is_not_a_pass() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).json_body(json!({"id": "u-1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments");
            then.status(200).json_body(json!({"id": "frag-1"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/frag-1");
            then.status(200).json_body(json!({
                "id": "frag-1",
                "uploadedFiles": [{"id": "file-9", "fileOriginalName": "lala.mp3", "mimeType": "audio/mpeg"}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/sound-fragments/file/file-9");
            then.status(200).header("content-type", "audio/mpeg").body(vec![0u8; 4096]);
        })
        .await;

    let music = TempDir::new()?;
    let file = music.path().join("lala.mp3");
    std::fs::write(&file, vec![3u8; 2048])?;

    let settings = ApiSettings::new(server.base_url(), "flow-token");
    assert!(settings.uploads_dir.is_none());

    let report = EndToEndFlow::new(client_for(&server), &settings)
        .with_settle(Duration::ZERO)
        .run(&file)
        .await;

    assert!(!report.all_passed(), "{report}");
    assert_eq!(report.passed_count(), 4);
    let fs_step = report.step("File System Storage").unwrap();
    assert!(!fs_step.passed);
    assert!(fs_step.detail.contains("UPLOADS_DIR not set"));
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_flow_flags_small_download_and_temp_file() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).body("");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments");
            then.status(200).json_body(json!({"id": "frag-2"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/frag-2");
            then.status(200)
                .json_body(json!({"id": "frag-2", "uploadedFiles": [{"id": "file-2"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/sound-fragments/file/file-2");
            then.status(200).body("tiny");
        })
        .await;

    let uploads = TempDir::new()?;
    std::fs::create_dir_all(uploads.path().join("temp"))?;
    std::fs::write(uploads.path().join("temp").join("lala.mp3"), b"left behind")?;

    let music = TempDir::new()?;
    let file = music.path().join("lala.mp3");
    std::fs::write(&file, vec![3u8; 2048])?;

    let mut settings = ApiSettings::new(server.base_url(), "flow-token");
    settings.uploads_dir = Some(uploads.path().to_path_buf());

    let report = EndToEndFlow::new(client_for(&server), &settings)
        .with_settle(Duration::ZERO)
        .run(&file)
        .await;

    assert!(!report.all_passed());
    assert!(!report.step("File Access by UUID").unwrap().passed);
    let fs_step = report.step("File System Storage").unwrap();
    assert!(!fs_step.passed);
    assert!(fs_step.detail.contains("still in temp"));
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_flow_stops_after_failed_upload() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(401).body("bad token");
        })
        .await;
    let upsert_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments");
            then.status(200).json_body(json!({"id": "never"}));
        })
        .await;

    let music = TempDir::new()?;
    let file = music.path().join("lala.mp3");
    std::fs::write(&file, vec![3u8; 16])?;

    let settings = ApiSettings::new(server.base_url(), "flow-token");
    let report = EndToEndFlow::new(client_for(&server), &settings).run(&file).await;

    assert_eq!(report.steps.len(), 1);
    assert!(!report.all_passed());
    assert_eq!(upsert_mock.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_full_flow_upload_only_stops_after_progress() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).json_body(json!({"id": "u-7"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/upload-progress/u-7");
            then.status(200).json_body(json!({"status": "finished", "percentage": 100}));
        })
        .await;
    let upsert_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments");
            then.status(200).json_body(json!({"id": "x"}));
        })
        .await;

    let music = TempDir::new()?;
    let file = music.path().join("song.mp3");
    std::fs::write(&file, vec![3u8; 512])?;

    let poller = PollerSettings {
        interval: Duration::from_millis(20),
        deadline: Some(Duration::from_secs(5)),
    };
    let report = FullFlow::new(client_for(&server), poller)
        .upload_only(true)
        .run(&file)
        .await;

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.steps.len(), 2);
    assert_eq!(upsert_mock.hits_async().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_full_flow_runs_every_step() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/new");
            then.status(200).json_body(json!({"title": ""}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).json_body(json!({"id": 5}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/upload-progress/5");
            then.status(200).json_body(json!({"status": "finished", "percentage": 100}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/soundfragments")
                .body_contains("\"title\":\"track\"");
            then.status(200).json_body(json!({"id": "frag-5"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/frag-5");
            then.status(200).json_body(json!({"id": "frag-5", "title": "track"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/files/frag-5/track.mp3");
            then.status(200).body(vec![1u8; 100]);
        })
        .await;
    let update_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/soundfragments/frag-5")
                .body_contains("\"title\":\"track (updated)\"");
            then.status(200).json_body(json!({"id": "frag-5", "title": "track (updated)"}));
        })
        .await;

    let music = TempDir::new()?;
    let file = music.path().join("track.mp3");
    std::fs::write(&file, vec![3u8; 512])?;

    let poller = PollerSettings {
        interval: Duration::from_millis(20),
        deadline: Some(Duration::from_secs(5)),
    };
    let report = FullFlow::new(client_for(&server), poller).run(&file).await;

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.steps.len(), 7);
    update_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_batch_upload_skips_failed_files() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/soundfragments/files/temp")
                .body_contains("filename=\"b.mp3\"");
            then.status(500).body("disk full");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments/files/temp");
            then.status(200).json_body(json!({"id": "u"}));
        })
        .await;
    let upsert_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/soundfragments")
                .body_contains("\"artist\":\"Avicii\"");
            then.status(200).json_body(json!({"id": "frag"}));
        })
        .await;

    let music = TempDir::new()?;
    for name in ["a.mp3", "b.mp3", "c.mp3", "d.mp3"] {
        std::fs::write(music.path().join(name), vec![0u8; 64])?;
    }

    let summary = BatchUpload::new(client_for(&server), "Avicii", "House")
        .with_limit(3)
        .run(music.path())
        .await?;

    assert_eq!(summary.found, 3);
    assert_eq!(summary.created.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].0.ends_with("b.mp3"));
    assert_eq!(upsert_mock.hits_async().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_snapshots_and_snapshot_file_check() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/genres");
            then.status(200).json_body(json!([{"name": "House"}, {"name": "Funk"}]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/soundfragments");
            then.status(200).json_body(json!({
                "id": "frag-3",
                "uploadedFiles": [
                    {"id": "f1", "fileOriginalName": "lala.mp3"},
                    {"id": "f2", "fileOriginalName": "gone.mp3"}
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/files/frag-3/lala.mp3");
            then.status(200).body(vec![1u8; 10]);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/soundfragments/files/frag-3/gone.mp3");
            then.status(404);
        })
        .await;

    let dir = TempDir::new()?;
    let storage = LocalStorage::new(dir.path());
    let client = client_for(&server);

    let genres = flows::save_genres(&client, &storage, GENRES_SNAPSHOT_FILE).await?;
    assert_eq!(genres, vec!["Funk", "House"]);
    let saved: Vec<String> = serde_json::from_slice(&std::fs::read(dir.path().join(GENRES_SNAPSHOT_FILE))?)?;
    assert_eq!(saved, genres);

    let payload = UpsertPayload::new("sleeping lala", "luliu", "Funk").with_file("lala.mp3");
    flows::upsert_with_snapshot(&client, &storage, FRAGMENT_SNAPSHOT_FILE, &payload, None).await?;
    assert!(dir.path().join(FRAGMENT_SNAPSHOT_FILE).exists());

    let report = flows::check_snapshot_files(&client, &storage, FRAGMENT_SNAPSHOT_FILE).await?;
    assert_eq!(report.steps.len(), 2);
    assert!(report.steps[0].passed);
    assert!(!report.steps[1].passed);
    assert!(report.steps[1].detail.contains("404"));

    let single = flows::check_file(&client, "frag-3", "lala.mp3").await;
    assert!(single.all_passed());
    Ok(())
}
