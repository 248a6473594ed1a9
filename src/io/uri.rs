use std::path::PathBuf;
use url::Url;

use crate::error::LoadError;

/// Represents a parsed source URI
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUri {
    Local(PathBuf),
    Http(Url),
}

impl SourceUri {
    /// Parse a URI string into a SourceUri
    pub fn parse(uri: &str) -> Result<Self, LoadError> {
        let invalid = |reason: &str| LoadError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        // Try parsing as URL first
        if let Ok(url) = Url::parse(uri) {
            match url.scheme() {
                "http" | "https" => {
                    if url.host_str().is_none_or(str::is_empty) {
                        return Err(invalid("missing host"));
                    }
                    if url.path().trim_start_matches('/').is_empty() {
                        return Err(invalid("missing dataset path"));
                    }
                    Ok(SourceUri::Http(url))
                }
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| invalid("not a valid file:// path"))?;
                    Ok(SourceUri::Local(path))
                }
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceUri::Local(PathBuf::from(uri))),
                scheme => Err(invalid(&format!("unsupported scheme '{}'", scheme))),
            }
        } else {
            // Treat as local file path
            Ok(SourceUri::Local(PathBuf::from(uri)))
        }
    }
}

impl std::fmt::Display for SourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceUri::Local(path) => write!(f, "{}", path.display()),
            SourceUri::Http(url) => write!(f, "{}", url),
        }
    }
}
