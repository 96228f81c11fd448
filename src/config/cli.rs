use crate::adapters::storage::{FRAGMENT_SNAPSHOT_FILE, GENRES_SNAPSHOT_FILE};
use crate::config::HarnessSettings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "fragment-harness")]
#[command(about = "Manual test harness for the sound fragment API")]
pub struct CliConfig {
    /// Path to an optional TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the tags read from an audio file
    Metadata { file: PathBuf },

    #[command(flatten)]
    Api(ApiCommand),
}

/// 需要 API_HOST / API_TOKEN 的指令
#[derive(Debug, Clone, Subcommand)]
pub enum ApiCommand {
    /// List fragments
    List {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value = "LOCAL")]
        source_type: String,
    },

    /// Fetch genre names and save them as JSON
    Genres {
        #[arg(long, default_value = GENRES_SNAPSHOT_FILE)]
        output: String,
    },

    /// Upload a single file
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "temp")]
        entity: String,
    },

    /// Create a fragment, or update one when --entity is given
    Upsert {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long)]
        genre: String,
        #[arg(long)]
        album: Option<String>,
        #[arg(long = "type")]
        fragment_type: Option<String>,
        /// Name of a previously uploaded file (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long)]
        entity: Option<String>,
        #[arg(long, default_value = FRAGMENT_SNAPSHOT_FILE)]
        snapshot: String,
    },

    /// Fetch a fragment by ID
    Get {
        id: String,
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Download an attached file by entity and file name
    FetchFile {
        entity: String,
        filename: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that an uploaded file is reachable
    CheckFile {
        filename: String,
        #[arg(long, default_value = "temp")]
        entity: String,
    },

    /// Request every file listed in a saved fragment snapshot
    CheckSnapshot {
        #[arg(long, default_value = FRAGMENT_SNAPSHOT_FILE)]
        snapshot: String,
    },

    /// Poll upload progress until it finishes
    Progress {
        upload_id: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Upload through the throttling relay and watch server-side progress
    WatchUpload {
        file: PathBuf,
        #[arg(long, default_value = "temp")]
        entity: String,
        #[arg(long)]
        no_proxy: bool,
        #[arg(long)]
        bandwidth_kbps: Option<u64>,
        #[arg(long)]
        proxy_port: Option<u16>,
    },

    /// Run the throttling relay in front of the API until Ctrl-C
    Relay {
        /// Upstream URL, defaults to API_HOST
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        listen_port: Option<u16>,
        #[arg(long)]
        bandwidth_kbps: Option<u64>,
    },

    /// Upload, attach, retrieve and download a file end to end
    EndToEnd {
        file: PathBuf,
        #[arg(long, default_value_t = 2)]
        settle_secs: u64,
    },

    /// Template, upload, progress, create, read, download and update
    FullFlow {
        file: PathBuf,
        #[arg(long)]
        upload_only: bool,
    },

    /// Upload every MP3 in a directory and create fragments from their tags
    BatchUpload {
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, default_value_t = 30)]
        limit: usize,
        /// Artist used when the file has no artist tag
        #[arg(long)]
        artist: String,
        /// Genre used when the file has no genre tag
        #[arg(long)]
        genre: String,
        #[arg(long, default_value = "temp")]
        entity: String,
    },
}

impl ApiCommand {
    /// 把指令列上的覆寫值寫回設定，之後再統一驗證
    pub fn apply_overrides(&self, settings: &mut HarnessSettings) {
        match self {
            ApiCommand::Progress {
                interval_ms,
                deadline_secs,
                ..
            } => {
                if let Some(ms) = interval_ms {
                    settings.poller.interval = Duration::from_millis(*ms);
                }
                if let Some(secs) = deadline_secs {
                    settings.poller.deadline = Some(Duration::from_secs(*secs));
                }
            }
            ApiCommand::WatchUpload {
                bandwidth_kbps,
                proxy_port,
                ..
            } => {
                if let Some(kbps) = bandwidth_kbps {
                    settings.relay.bandwidth_kbps = *kbps;
                }
                if let Some(port) = proxy_port {
                    settings.relay.listen_port = *port;
                }
            }
            ApiCommand::Relay {
                listen_port,
                bandwidth_kbps,
                ..
            } => {
                if let Some(kbps) = bandwidth_kbps {
                    settings.relay.bandwidth_kbps = *kbps;
                }
                if let Some(port) = listen_port {
                    settings.relay.listen_port = *port;
                }
            }
            _ => {}
        }
    }
}
