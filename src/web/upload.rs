//! `POST /image`: stream one multipart file field to `<peer-addr>.img`.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::{
    extract::{
        ConnectInfo, State,
        multipart::{Field, Multipart, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio::fs::File;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::core::progress::{Direction, ProgressCounter, copy_with_progress};

/// Why an upload was not stored. Only ever fails the one request.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("malformed multipart form: {0}")]
    MalformedForm(String),

    #[error("form has no field named {0:?}")]
    MissingField(String),

    #[error("failed to create {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("error receiving into {} ({written} bytes written): {source}", .path.display())]
    Copy {
        path: PathBuf,
        written: u64,
        source: io::Error,
    },
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MalformedForm(_) | Self::MissingField(_) => StatusCode::BAD_REQUEST,
            Self::Create { .. } | Self::Copy { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        status.into_response()
    }
}

/// File name an upload from `peer` is stored under.
pub fn image_file_name(peer: SocketAddr) -> String {
    format!("{}.img", peer)
}

pub async fn receive_image(
    State(ctx): State<AppContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, UploadError> {
    let result = store_upload(&ctx, peer, multipart).await;

    match &result {
        Ok((path, bytes)) => {
            println!();
            info!(peer = %peer, path = %path.display(), bytes, "Stored uploaded image");
        }
        Err(e @ (UploadError::MalformedForm(_) | UploadError::MissingField(_))) => {
            warn!(peer = %peer, error = %e, "Rejected upload");
        }
        Err(e) => {
            error!(peer = %peer, error = %e, "Failed to store upload");
        }
    }

    result.map(|_| StatusCode::OK)
}

async fn store_upload(
    ctx: &AppContext,
    peer: SocketAddr,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(PathBuf, u64), UploadError> {
    let field_name = &ctx.config.field_name;
    let mut multipart = multipart.map_err(|e| UploadError::MalformedForm(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::MalformedForm(e.body_text()))?
    {
        if field.name() != Some(field_name.as_str()) {
            continue;
        }

        let path = ctx.config.upload_directory.join(image_file_name(peer));
        let written = write_field(field, &path).await?;
        return Ok((path, written));
    }

    Err(UploadError::MissingField(field_name.clone()))
}

async fn write_field(field: Field<'_>, path: &Path) -> Result<u64, UploadError> {
    let mut out = File::create(path)
        .await
        .map_err(|source| UploadError::Create {
            path: path.to_path_buf(),
            source,
        })?;

    let body = StreamReader::new(field.map_err(io::Error::other));
    tokio::pin!(body);

    let mut counter = ProgressCounter::new(Direction::Receiving);
    copy_with_progress(&mut body, &mut out, &mut counter)
        .await
        .map_err(|e| UploadError::Copy {
            path: path.to_path_buf(),
            written: e.written,
            source: e.error,
        })
}
