//! Newline-delimited text transport.
//!
//! A connection is split into a [`LineReader`], owned by the session task,
//! and a [`LineWriter`], a cheap-to-clone handle shared with the registry so
//! the broadcaster can reach the peer.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All I/O failures surface as `TransportError`

use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::sync::Mutex;

/// Maximum accepted length of one incoming line (1 MB)
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Type alias for the type-erased write half of a connection
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reads newline-terminated records from a byte stream.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Reads the next line without its `\n` or `\r\n` terminator.
    ///
    /// Returns `Ok(None)` at end-of-stream. A final record without a
    /// trailing newline is still returned. Invalid UTF-8 is replaced with
    /// U+FFFD rather than rejected.
    ///
    /// # Errors
    ///
    /// - `TransportError::Io` if the underlying read fails
    /// - `TransportError::LineTooLong` if the record exceeds `MAX_LINE_BYTES`
    pub async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        self.buf.clear();

        // One byte past the cap is enough to tell an oversized record apart
        let bytes_read = (&mut self.reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if self.buf.len() > MAX_LINE_BYTES && !self.buf.ends_with(b"\n") {
            return Err(TransportError::LineTooLong {
                size: self.buf.len(),
                max: MAX_LINE_BYTES,
            });
        }

        let mut line = String::from_utf8_lossy(&self.buf).into_owned();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }
}

/// Writes newline-terminated records to a byte stream.
///
/// Clones share the same underlying writer. Each `write_line` holds the
/// writer lock for the whole line, so lines from concurrent callers never
/// interleave.
#[derive(Clone)]
pub struct LineWriter {
    inner: Arc<Mutex<BufWriter<BoxedWriter>>>,
}

impl LineWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWriter = Box::new(writer);
        Self {
            inner: Arc::new(Mutex::new(BufWriter::new(boxed))),
        }
    }

    /// Appends a newline, writes and flushes.
    pub async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut writer = self.inner.lock().await;

        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        result.map_err(|e| TransportError::Io(e.to_string()))
    }

    /// Flushes and closes the write side of the connection.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut writer = self.inner.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

}

/// Errors that can occur on a line transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Line too large: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}
