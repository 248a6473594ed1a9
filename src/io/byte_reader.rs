use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Read};

use crate::config::READ_BUFFER_SIZE;
use crate::error::LoadError;

/// A forward-only byte stream, opened once per load
pub type ByteStream = Box<dyn Read + Send>;

/// Abstraction over where the source bytes come from (local file, HTTP, ...)
///
/// `open` hands back a stream positioned at the first byte. A source is opened
/// exactly once per run; re-running a load means opening it again.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Location shown in logs and error messages
    fn location(&self) -> String;

    async fn open(&self) -> Result<ByteStream, LoadError>;
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Wrap a raw stream so gzip content is decompressed transparently.
///
/// Detection is by magic bytes, so plain CSV passes through untouched.
pub fn decompress(stream: ByteStream) -> Result<Box<dyn BufRead + Send>, LoadError> {
    let mut buffered = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
    let head = buffered
        .fill_buf()
        .map_err(|e| LoadError::io("Failed to read source", e))?;

    if head.starts_with(&GZIP_MAGIC) {
        tracing::debug!("gzip stream detected");
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            MultiGzDecoder::new(buffered),
        )))
    } else {
        Ok(Box::new(buffered))
    }
}
