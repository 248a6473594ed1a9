use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::byte_reader::{ByteSource, ByteStream};
use crate::error::LoadError;

/// ByteSource implementation for local files
#[derive(Clone)]
pub struct LocalFileByteSource {
    file_path: PathBuf,
}

impl LocalFileByteSource {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteSource for LocalFileByteSource {
    fn location(&self) -> String {
        self.file_path.display().to_string()
    }

    async fn open(&self) -> Result<ByteStream, LoadError> {
        let file = tokio::fs::File::open(&self.file_path)
            .await
            .map_err(|e| LoadError::io(format!("Failed to open {}", self.location()), e))?;

        Ok(Box::new(file.into_std().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_open_reads_whole_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "VendorID\n1\n").unwrap();
        temp_file.flush().unwrap();

        let source = LocalFileByteSource::new(temp_file.path());
        let mut stream = source.open().await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "VendorID\n1\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let source = LocalFileByteSource::new("/nonexistent/trips.csv.gz");
        let err = source.open().await.err().unwrap();
        assert_eq!(err.category(), crate::error::ErrorCategory::SourceAccess);
    }
}
