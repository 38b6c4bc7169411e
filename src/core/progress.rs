//! Live byte-count reporting for a single transfer.
//!
//! A `ProgressCounter` is created per transfer and owned by the copy loop that
//! drives it; it is never shared. Every chunk it observes rewrites one status
//! line on the operator's terminal in place.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::logging::LogThrottle;

/// Buffer size for the tee copy loop (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Width of the blanking run written before each status line
const CLEAR_WIDTH: usize = 35;

const LOG_INTERVAL: Duration = Duration::from_millis(500);

/// Which way the bytes are flowing, used to label the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downloading,
    Uploading,
    Receiving,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "Downloading",
            Self::Uploading => "Uploading",
            Self::Receiving => "Receiving",
        }
    }
}

/// Counts the bytes written to it and reports the running total on each write.
///
/// Implements `std::io::Write` so it can sit on the side of any copy as a
/// passive observer: writes always succeed and display errors are ignored.
pub struct ProgressCounter<W: Write = Stdout> {
    total: u64,
    direction: Direction,
    sink: W,
    throttle: LogThrottle,
}

impl ProgressCounter<Stdout> {
    pub fn new(direction: Direction) -> Self {
        Self::with_sink(direction, io::stdout())
    }
}

impl<W: Write> ProgressCounter<W> {
    pub fn with_sink(direction: Direction, sink: W) -> Self {
        Self {
            total: 0,
            direction,
            sink,
            throttle: LogThrottle::new(LOG_INTERVAL),
        }
    }

    /// Total bytes observed so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Add a chunk to the running total and redraw the status line.
    pub fn record(&mut self, chunk: &[u8]) {
        self.total += chunk.len() as u64;
        self.print_progress();

        if self.throttle.should_log() {
            debug!(
                direction = self.direction.as_str(),
                total_bytes = self.total,
                "Transfer progress"
            );
        }
    }

    fn print_progress(&mut self) {
        // Blank the previous line, then return and draw the current total
        let _ = write!(self.sink, "\r{}", " ".repeat(CLEAR_WIDTH));
        let _ = write!(
            self.sink,
            "\r{}... {} complete",
            self.direction.as_str(),
            humanize_bytes(self.total)
        );
        let _ = self.sink.flush();
    }
}

impl<W: Write> Write for ProgressCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Format a byte count with SI units, e.g. `"9 B"`, `"1.5 kB"`, `"12 MB"`.
///
/// Values are rounded to one decimal; the decimal is only shown below 10.
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
    const BASE: f64 = 1000.0;

    if bytes < 10 {
        return format!("{} B", bytes);
    }

    let exponent = ((bytes as f64).ln() / BASE.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = (bytes as f64 / BASE.powi(exponent as i32) * 10.0 + 0.5).floor() / 10.0;

    if value < 10.0 {
        format!("{:.1} {}", value, UNITS[exponent])
    } else {
        format!("{:.0} {}", value, UNITS[exponent])
    }
}

/// A copy that failed partway, with how far it got.
#[derive(Debug, thiserror::Error)]
#[error("copy failed after {written} bytes: {error}")]
pub struct CopyError {
    pub written: u64,
    pub error: io::Error,
}

/// Copy `reader` into `writer` in a single pass, feeding every chunk to
/// `counter` on the way through.
///
/// The writer is flushed before returning. Returns the number of bytes written.
pub async fn copy_with_progress<R, W, S>(
    reader: &mut R,
    writer: &mut W,
    counter: &mut ProgressCounter<S>,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
    S: Write,
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written: u64 = 0;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .await
            .map_err(|error| CopyError { written, error })?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .await
            .map_err(|error| CopyError { written, error })?;

        written += bytes_read as u64;
        counter.record(&buffer[..bytes_read]);
    }

    writer
        .flush()
        .await
        .map_err(|error| CopyError { written, error })?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Hands out at most `chunk` bytes per read.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        reads: usize,
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let end = (self.pos + self.chunk)
                .min(self.data.len())
                .min(self.pos + buf.remaining());
            let start = self.pos;
            buf.put_slice(&self.data[start..end]);
            self.pos = end;
            self.reads += 1;
            Poll::Ready(Ok(()))
        }
    }

    /// Always fails writes after accepting `limit` bytes.
    struct FailingWriter {
        accepted: usize,
        limit: usize,
    }

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.accepted >= self.limit {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::StorageFull, "disk full")));
            }
            let n = buf.len().min(self.limit - self.accepted);
            self.accepted += n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_humanize_bytes() {
        assert_eq!(humanize_bytes(0), "0 B");
        assert_eq!(humanize_bytes(9), "9 B");
        assert_eq!(humanize_bytes(999), "999 B");
        assert_eq!(humanize_bytes(1000), "1.0 kB");
        assert_eq!(humanize_bytes(1500), "1.5 kB");
        assert_eq!(humanize_bytes(12_300_000), "12 MB");
        assert_eq!(humanize_bytes(3_210_000_000), "3.2 GB");
    }

    #[test]
    fn test_total_is_sum_of_writes() {
        let mut counter = ProgressCounter::with_sink(Direction::Downloading, Vec::new());
        let data = [7u8; 100];

        counter.record(&data[..1]);
        counter.record(&data[..0]);
        counter.record(&data[..42]);
        counter.record(&data[..57]);

        assert_eq!(counter.total(), 100);
    }

    #[test]
    fn test_total_independent_of_chunk_boundaries() {
        let data = vec![1u8; 4096];
        for chunk in [1, 3, 64, 1000, 4096] {
            let mut counter = ProgressCounter::with_sink(Direction::Receiving, Vec::new());
            for piece in data.chunks(chunk) {
                counter.record(piece);
            }
            assert_eq!(counter.total(), 4096, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_write_always_reports_full_length() {
        let mut counter = ProgressCounter::with_sink(Direction::Uploading, Vec::new());
        assert_eq!(counter.write(b"hello").unwrap(), 5);
        assert!(counter.flush().is_ok());
        assert_eq!(counter.total(), 5);
    }

    #[test]
    fn test_status_line_rewritten_in_place() {
        let mut counter = ProgressCounter::with_sink(Direction::Downloading, Vec::new());
        counter.record(b"0123456789");
        counter.record(b"0123456789");

        let output = String::from_utf8(counter.into_sink()).unwrap();
        let blank = format!("\r{}", " ".repeat(CLEAR_WIDTH));
        let expected = format!(
            "{blank}\rDownloading... 10 B complete{blank}\rDownloading... 20 B complete"
        );
        assert_eq!(output, expected);
        assert!(!output.contains('\n'));
    }

    #[tokio::test]
    async fn test_copy_with_progress_single_pass() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = ChunkedReader {
            data: data.clone(),
            pos: 0,
            chunk: 333,
            reads: 0,
        };
        let mut out = Vec::new();
        let mut counter = ProgressCounter::with_sink(Direction::Downloading, Vec::new());

        let written = copy_with_progress(&mut reader, &mut out, &mut counter)
            .await
            .unwrap();

        assert_eq!(written, data.len() as u64);
        assert_eq!(counter.total(), data.len() as u64);
        assert_eq!(out, data);
        // 31 data reads (30 full chunks + 1 partial) plus the final EOF read
        assert_eq!(reader.reads, 32);
    }

    #[tokio::test]
    async fn test_copy_with_progress_empty_source() {
        let mut reader: &[u8] = &[];
        let mut out = Vec::new();
        let mut counter = ProgressCounter::with_sink(Direction::Downloading, Vec::new());

        let written = copy_with_progress(&mut reader, &mut out, &mut counter)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(counter.total(), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_copy_with_progress_reports_bytes_written_on_failure() {
        let data = vec![0u8; 1000];
        let mut reader = ChunkedReader {
            data,
            pos: 0,
            chunk: 100,
            reads: 0,
        };
        let mut out = FailingWriter {
            accepted: 0,
            limit: 250,
        };
        let mut counter = ProgressCounter::with_sink(Direction::Uploading, Vec::new());

        let err = copy_with_progress(&mut reader, &mut out, &mut counter)
            .await
            .unwrap_err();

        assert_eq!(err.written, 200);
        assert_eq!(err.error.kind(), io::ErrorKind::StorageFull);
        assert_eq!(counter.total(), 200);
    }
}
