pub mod batch_upload;
pub mod end_to_end;
pub mod file_check;
pub mod full_flow;
pub mod report;
pub mod snapshots;

pub use batch_upload::{BatchUpload, BatchUploadSummary};
pub use end_to_end::EndToEndFlow;
pub use file_check::{check_file, check_snapshot_files};
pub use full_flow::FullFlow;
pub use report::{FlowReport, StepResult};
pub use snapshots::{save_genres, upsert_with_snapshot};
