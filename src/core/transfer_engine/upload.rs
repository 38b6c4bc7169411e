use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;
use tracing::{Instrument, debug, info_span};

use super::TransferError;
use super::multipart::MultipartWriter;
use crate::core::progress::{Direction, ProgressCounter, copy_with_progress};

/// Form field the image travels under, on both client and server.
pub const IMAGE_FIELD_NAME: &str = "BootyImage";

/// In-flight bytes between the body producer and the HTTP client
const PIPE_CAPACITY: usize = 64 * 1024;

/// Upload `path` to `uri` as a single-part `multipart/form-data` POST.
///
/// The encoded body is never held in memory: a producer task writes it into a
/// byte pipe that the HTTP client drains as it sends. This returns only after
/// both the request and the producer have finished. A failure on either side
/// is reported through [`TransferError::Upload`], which carries both.
///
/// The response status is not inspected here.
pub async fn upload_multipart_file(
    client: &reqwest::Client,
    uri: &str,
    field_name: &str,
    path: &Path,
) -> Result<reqwest::Response, TransferError> {
    // Open up front so a missing source never reaches the network
    let source = File::open(path).await.map_err(|source| TransferError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (body_reader, body_writer) = tokio::io::duplex(PIPE_CAPACITY);
    let multipart = MultipartWriter::new(body_writer);

    let request = client
        .post(uri)
        .header(CONTENT_TYPE, multipart.content_type())
        .body(reqwest::Body::wrap_stream(ReaderStream::new(body_reader)))
        .build()
        .map_err(|source| TransferError::Request {
            url: uri.to_string(),
            source,
        })?;

    let span = info_span!("upload", uri = %uri, path = %path.display());
    let producer = tokio::spawn(
        produce_body(
            multipart,
            source,
            field_name.to_string(),
            filename,
            path.to_path_buf(),
        )
        .instrument(span.clone()),
    );

    let (http, produced) = tokio::join!(client.execute(request).instrument(span), producer);

    let multipart_error = match produced {
        Ok(Ok(bytes)) => {
            debug!(bytes, "Multipart body complete");
            None
        }
        Ok(Err(e)) => Some(e),
        Err(e) => Some(TransferError::Task(e)),
    };

    match (http, multipart_error) {
        (Ok(response), None) => Ok(response),
        (http, multipart) => Err(TransferError::Upload {
            http: http.err(),
            multipart: multipart.map(Box::new),
        }),
    }
}

/// Encode the form into the pipe. Dropping `multipart` on any early return
/// closes the write end, so the reader always sees the stream end.
async fn produce_body(
    mut multipart: MultipartWriter<DuplexStream>,
    mut source: File,
    field_name: String,
    filename: String,
    path: PathBuf,
) -> Result<u64, TransferError> {
    multipart
        .begin_file(&field_name, &filename)
        .await
        .map_err(TransferError::Encode)?;

    let mut counter = ProgressCounter::new(Direction::Uploading);
    let written = copy_with_progress(&mut source, multipart.part_body(), &mut counter)
        .await
        .map_err(|e| TransferError::Copy {
            path,
            written: e.written,
            source: e.error,
        })?;

    multipart.finish().await.map_err(TransferError::Encode)?;

    Ok(written)
}
