use clap::Parser;
use fragment_harness::adapters::http::ListQuery;
use fragment_harness::app::flows::{self, BatchUpload, EndToEndFlow, FlowReport, FullFlow};
use fragment_harness::domain::model::UpsertPayload;
use fragment_harness::utils::error::HarnessError;
use fragment_harness::utils::{logger, validation::Validate};
use fragment_harness::{
    ApiCommand, AudioMetadataParser, CliConfig, Command, FragmentClient, HarnessSettings, LocalStorage, ProgressPoller, RelayConfig,
    Result, ThrottlingRelay, UploadWatch,
};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting fragment-harness");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

/// 回傳 false 代表流程跑完但有步驟失敗
async fn run(cli: CliConfig) -> Result<bool> {
    match cli.command {
        Command::Metadata { file } => {
            let metadata = AudioMetadataParser::new().try_parse(&file)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(true)
        }
        Command::Api(command) => {
            let mut settings = HarnessSettings::load(cli.config.as_deref())?;
            // 先套用指令列覆寫再驗證
            command.apply_overrides(&mut settings);
            settings.validate()?;
            run_api(command, settings).await
        }
    }
}

async fn run_api(command: ApiCommand, settings: HarnessSettings) -> Result<bool> {
    tracing::info!("API host: {} (token {})", settings.api.host, settings.api.masked_token());

    let client = FragmentClient::new(&settings.api)?;
    let storage = LocalStorage::new(settings.snapshot_dir.clone());

    match command {
        ApiCommand::List {
            limit,
            offset,
            source_type,
        } => {
            let fragments = client
                .list_fragments(&ListQuery {
                    limit,
                    offset,
                    source_type,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&fragments)?);
            tracing::info!("📋 {} fragments", fragments.len());
            Ok(true)
        }

        ApiCommand::Genres { output } => {
            let names = flows::save_genres(&client, &storage, &output).await?;
            for name in &names {
                println!("{}", name);
            }
            Ok(true)
        }

        ApiCommand::Upload { file, entity } => {
            let accepted = client.upload_file(&entity, &file).await?;
            println!("{}", serde_json::to_string_pretty(&accepted)?);
            Ok(true)
        }

        ApiCommand::Upsert {
            title,
            artist,
            genre,
            album,
            fragment_type,
            files,
            entity,
            snapshot,
        } => {
            let mut payload = UpsertPayload::new(title, artist, genre);
            payload.album = album;
            payload.fragment_type = fragment_type;
            payload.newly_uploaded = files;

            let fragment =
                flows::upsert_with_snapshot(&client, &storage, &snapshot, &payload, entity.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&fragment)?);
            Ok(true)
        }

        ApiCommand::Get { id, lang } => {
            let fragment = client.get_fragment(&id, Some(&lang)).await?;
            println!("{}", serde_json::to_string_pretty(&fragment)?);
            Ok(true)
        }

        ApiCommand::FetchFile {
            entity,
            filename,
            output,
        } => {
            let download = client.get_file(&entity, &filename).await?;
            println!(
                "Status: {}, Content-Type: {}, {} bytes",
                download.status,
                download.content_type.as_deref().unwrap_or("unknown"),
                download.len()
            );
            if let Some(output) = output {
                tokio::fs::write(&output, &download.bytes).await?;
                tracing::info!("💾 Saved to {}", output.display());
            }
            Ok(true)
        }

        ApiCommand::CheckFile { filename, entity } => Ok(print_report(flows::check_file(&client, &entity, &filename).await)),

        ApiCommand::CheckSnapshot { snapshot } => {
            let report = flows::check_snapshot_files(&client, &storage, &snapshot).await?;
            Ok(print_report(report))
        }

        ApiCommand::Progress { upload_id, .. } => {
            let report = ProgressPoller::from_settings(client, &settings.poller)
                .poll(&upload_id)
                .await;
            println!(
                "{} after {} polls ({:.1}s)",
                report.outcome.label(),
                report.polls,
                report.elapsed.as_secs_f64()
            );
            Ok(report.outcome.is_success())
        }

        ApiCommand::WatchUpload {
            file,
            entity,
            no_proxy,
            ..
        } => {
            let mut watch = UploadWatch::new(client, settings.poller.clone());
            if !no_proxy {
                watch = watch.through_relay(RelayConfig::for_upstream(&settings.api.host, &settings.relay)?);
            }
            let report = watch.run(&file, &entity).await?;
            println!("FINAL RESULT: {}", report.summary());
            Ok(report.succeeded())
        }

        ApiCommand::Relay { target, .. } => {
            let target = target.unwrap_or_else(|| settings.api.host.clone());
            let config = RelayConfig::for_upstream(&target, &settings.relay)?;

            let handle = ThrottlingRelay::new(config).start().await?;
            println!("Relay listening on {} (Ctrl-C to stop)", handle.base_url());
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| HarnessError::relay(format!("Cannot listen for Ctrl-C: {}", e)))?;
            handle.shutdown().await;
            Ok(true)
        }

        ApiCommand::EndToEnd { file, settle_secs } => {
            let report = EndToEndFlow::new(client, &settings.api)
                .with_settle(Duration::from_secs(settle_secs))
                .run(&file)
                .await;
            Ok(print_report(report))
        }

        ApiCommand::FullFlow { file, upload_only } => {
            let report = FullFlow::new(client, settings.poller.clone())
                .upload_only(upload_only)
                .run(&file)
                .await;
            Ok(print_report(report))
        }

        ApiCommand::BatchUpload {
            dir,
            limit,
            artist,
            genre,
            entity,
        } => {
            let dir = dir
                .or_else(|| settings.api.music_dir.clone())
                .ok_or_else(|| HarnessError::MissingConfigError {
                    field: "MUSIC_DIR".to_string(),
                })?;
            let summary = BatchUpload::new(client, artist, genre)
                .with_limit(limit)
                .with_entity(entity)
                .run(&dir)
                .await?;
            println!(
                "Found {} files: {} created, {} failed",
                summary.found,
                summary.created.len(),
                summary.failed.len()
            );
            for (path, reason) in &summary.failed {
                println!("  ❌ {}: {}", path.display(), reason);
            }
            Ok(summary.failed.is_empty())
        }
    }
}

fn print_report(report: FlowReport) -> bool {
    print!("{}", report);
    report.all_passed()
}
