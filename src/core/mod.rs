pub mod metadata;
pub mod poller;
pub mod relay;
pub mod upload_watch;
