use std::io;
use std::path::Path;

use futures::TryStreamExt;
use tokio::fs::File;
use tokio_util::io::StreamReader;
use tracing::{Instrument, debug, info_span, warn};

use super::TransferError;
use crate::core::progress::{Direction, ProgressCounter, copy_with_progress};

/// Download `src` into `dst`, truncating any existing file.
///
/// The response body is copied in one pass, every chunk going to the file and
/// to a progress counter on the way. The destination is only created once the
/// response headers have arrived, so a transport failure leaves nothing behind.
/// Returns the number of bytes written.
pub async fn download_file(
    client: &reqwest::Client,
    src: &str,
    dst: &Path,
) -> Result<u64, TransferError> {
    let span = info_span!("download", src = %src, dst = %dst.display());

    async {
        let request = client
            .get(src)
            .build()
            .map_err(|source| TransferError::Request {
                url: src.to_string(),
                source,
            })?;

        let response = client
            .execute(request)
            .await
            .map_err(|source| TransferError::Http {
                url: src.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Response received");
        } else {
            warn!(status = %status, "Non-success status, writing body anyway");
        }

        let mut out = File::create(dst)
            .await
            .map_err(|source| TransferError::Create {
                path: dst.to_path_buf(),
                source,
            })?;

        let body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        tokio::pin!(body);

        let mut counter = ProgressCounter::new(Direction::Downloading);
        let written = copy_with_progress(&mut body, &mut out, &mut counter)
            .await
            .map_err(|e| TransferError::Copy {
                path: dst.to_path_buf(),
                written: e.written,
                source: e.error,
            })?;

        debug!(bytes = written, "Download complete");
        Ok(written)
    }
    .instrument(span)
    .await
}
