//! I/O abstraction layer for reading bytes from different sources

pub mod byte_reader;
pub mod http_reader;
pub mod local_reader;
pub mod uri;

use std::sync::Arc;

pub use byte_reader::{ByteSource, decompress};
pub use http_reader::HttpByteSource;
pub use local_reader::LocalFileByteSource;
pub use uri::SourceUri;

use crate::error::LoadError;

/// Create the ByteSource matching a parsed URI
pub fn byte_source(uri: &SourceUri) -> Result<Arc<dyn ByteSource>, LoadError> {
    match uri {
        SourceUri::Local(path) => Ok(Arc::new(LocalFileByteSource::new(path))),
        SourceUri::Http(url) => Ok(Arc::new(HttpByteSource::new(
            HttpByteSource::client()?,
            url.clone(),
        ))),
    }
}
