//! Minimal `multipart/form-data` writer for one streamed file part.
//!
//! Wire layout:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<field>"; filename="<file>"\r\n
//! Content-Type: application/octet-stream\r\n
//! \r\n
//! <file bytes>\r\n
//! --<boundary>--\r\n
//! ```

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
}

impl<W: AsyncWrite + Unpin> MultipartWriter<W> {
    /// Wrap `inner` with a fresh random boundary.
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, Uuid::now_v7().simple().to_string())
    }

    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Write the opening boundary and part headers for a file field.
    pub async fn begin_file(&mut self, field_name: &str, filename: &str) -> io::Result<()> {
        let header = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            self.boundary,
            escape_quotes(field_name),
            escape_quotes(filename),
        );
        self.inner.write_all(header.as_bytes()).await
    }

    /// The underlying writer, for streaming the part's body.
    pub fn part_body(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Write the closing boundary and shut the underlying writer down.
    pub async fn finish(mut self) -> io::Result<()> {
        let trailer = format!("\r\n--{}--\r\n", self.boundary);
        self.inner.write_all(trailer.as_bytes()).await?;
        self.inner.shutdown().await
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
