pub mod host;
pub mod orchestrator;
pub mod progress;
pub mod transfer_engine;

pub use host::{Reboot, Screen};
pub use orchestrator::Orchestrator;
pub use progress::{Direction, ProgressCounter};
pub use transfer_engine::{IMAGE_FIELD_NAME, TransferError, download_file, upload_multipart_file};
