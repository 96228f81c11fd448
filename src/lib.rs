pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::{ApiCommand, CliConfig, Command};

pub use crate::adapters::{FragmentClient, LocalStorage};
pub use crate::config::{ApiSettings, HarnessSettings};
pub use crate::core::{
    metadata::AudioMetadataParser,
    poller::{PollOutcome, ProgressPoller},
    relay::{RelayConfig, ThrottlingRelay},
    upload_watch::UploadWatch,
};
pub use crate::utils::error::{HarnessError, Result};
