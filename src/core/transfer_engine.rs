//! Streaming HTTP transfer of disk images.
//!
//! - `upload`: push a local file as a single-part multipart POST
//! - `download`: pull a URL into a local file
//! - `multipart`: the form-data encoder the upload producer writes through
//!
//! Neither direction buffers the image in memory, retries, or resumes.

mod download;
mod multipart;
mod upload;

use std::fmt::Display;
use std::path::PathBuf;

pub use download::download_file;
pub use multipart::MultipartWriter;
pub use upload::{IMAGE_FIELD_NAME, upload_multipart_file};

/// Errors produced while moving an image between disk and network.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to build request for {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create {}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error copying {} ({written} bytes written)", .path.display())]
    Copy {
        path: PathBuf,
        written: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode multipart body")]
    Encode(#[source] std::io::Error),

    #[error("upload producer task failed")]
    Task(#[from] tokio::task::JoinError),

    /// The transport and the body producer fail independently; both are kept.
    #[error("http error: {}, multipart error: {}", describe(.http), describe(.multipart))]
    Upload {
        http: Option<reqwest::Error>,
        multipart: Option<Box<TransferError>>,
    },
}

fn describe<E: Display>(error: &Option<E>) -> String {
    match error {
        Some(e) => e.to_string(),
        None => "none".to_string(),
    }
}
