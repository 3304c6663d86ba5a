//! Error types for provider operations

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure reported by a file system, web request or scheduler operation.
///
/// The `Display` form is what script code receives as an error string.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// I/O failure on a concrete path
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Path is empty or cannot be resolved
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// URL failed to parse or uses an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Background runtime could not be started
    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),

    /// Any other provider-specific failure
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns true if the error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<url::ParseError> for ProviderError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let err = ProviderError::io(
            "/tmp/missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not there"),
        );
        assert_eq!(err.to_string(), "/tmp/missing.txt: not there");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_error() {
        let err = ProviderError::other("disk full");
        assert_eq!(err.to_string(), "disk full");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let err: ProviderError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ProviderError::InvalidUrl(_)));
    }
}
