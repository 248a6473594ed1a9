use async_trait::async_trait;
use std::io::{Seek, SeekFrom};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::byte_reader::{ByteSource, ByteStream};
use crate::config::HTTP_CONNECT_TIMEOUT;
use crate::error::LoadError;

/// ByteSource implementation for files published over HTTP(S)
///
/// The response body is streamed into an anonymous temp file and the returned
/// stream reads from that file, so memory stays bounded by the read buffer
/// rather than the size of the download. The temp file is unlinked on creation
/// and disappears when the stream is dropped.
#[derive(Clone)]
pub struct HttpByteSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpByteSource {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn client() -> Result<reqwest::Client, LoadError> {
        reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|source| LoadError::Fetch {
                url: String::new(),
                source,
            })
    }

    fn fetch_error(&self, source: reqwest::Error) -> LoadError {
        LoadError::Fetch {
            url: self.url.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    fn location(&self) -> String {
        self.url.to_string()
    }

    async fn open(&self) -> Result<ByteStream, LoadError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.fetch_error(e))?;

        tracing::info!(
            url = %self.url,
            content_length = ?response.content_length(),
            "downloading source"
        );

        let staging = tempfile::tempfile()
            .map_err(|e| LoadError::io("Failed to create staging file", e))?;
        let mut staging = tokio::fs::File::from_std(staging);
        let mut downloaded = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| self.fetch_error(e))? {
            staging
                .write_all(&chunk)
                .await
                .map_err(|e| LoadError::io("Failed to write staging file", e))?;
            downloaded += chunk.len() as u64;
        }
        staging
            .flush()
            .await
            .map_err(|e| LoadError::io("Failed to write staging file", e))?;

        tracing::info!(bytes = downloaded, "download complete");

        let mut staging = staging.into_std().await;
        staging
            .seek(SeekFrom::Start(0))
            .map_err(|e| LoadError::io("Failed to rewind staging file", e))?;

        Ok(Box::new(staging))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a loopback port
    async fn serve_once(status: &'static str, body: Vec<u8>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(header.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        Url::parse(&format!("http://{}/yellow/trips.csv.gz", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_download_is_staged() {
        let url = serve_once("200 OK", b"VendorID\n1\n2\n".to_vec()).await;
        let source = HttpByteSource::new(HttpByteSource::client().unwrap(), url);

        let mut stream = source.open().await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "VendorID\n1\n2\n");
    }

    #[tokio::test]
    async fn test_error_status_is_source_error() {
        let url = serve_once("404 Not Found", Vec::new()).await;
        let source = HttpByteSource::new(HttpByteSource::client().unwrap(), url);

        let err = source.open().await.err().unwrap();
        assert!(matches!(err, LoadError::Fetch { .. }));
        assert_eq!(err.category(), crate::error::ErrorCategory::SourceAccess);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_source_error() {
        // Bind then drop to get a port nobody is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/trips.csv.gz", addr)).unwrap();
        let source = HttpByteSource::new(HttpByteSource::client().unwrap(), url);
        let err = source.open().await.err().unwrap();
        assert_eq!(err.category(), crate::error::ErrorCategory::SourceAccess);
    }
}
