//! Error types for ghpull-update.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Errors that can occur while resolving, fetching or staging a release.
#[derive(Debug, Error)]
pub enum UpdateError {
    // Network errors
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse {
        url: String,
        message: String,
        body: Option<String>,
    },

    // Precondition errors
    #[error("Refusing to fetch {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid repository reference: {input}")]
    InvalidRepository { input: String },

    #[error("The GraphQL API requires an access token")]
    MissingToken,

    // File system errors
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Host errors
    #[error("Installation failed: {message}")]
    InstallFailed { message: String },

    // Config errors
    #[error("Failed to load config: {message}")]
    Config { message: String },
}

/// Machine-readable error code: the HTTP status when the remote answered,
/// a stable sentinel otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Status(u16),
    Named(&'static str),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl UpdateError {
    /// Wrap an I/O error with the path it concerns.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Error code for host-side reporting.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::HttpStatus { status, .. } => ErrorCode::Status(*status),
            Self::Transport { .. } => ErrorCode::Named("transport"),
            Self::MalformedResponse { .. } => ErrorCode::Named("malformed_response"),
            Self::InvalidUrl { .. } => ErrorCode::Named("invalid_url"),
            Self::InvalidRepository { .. } => ErrorCode::Named("invalid_repository"),
            Self::MissingToken => ErrorCode::Named("missing_token"),
            Self::Filesystem { .. } => ErrorCode::Named("filesystem"),
            Self::InstallFailed { .. } => ErrorCode::Named("install_failed"),
            Self::Config { .. } => ErrorCode::Named("config"),
        }
    }

    /// The raw response body preserved for diagnostics, if any.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body, .. } => Some(body),
            Self::MalformedResponse { body, .. } => body.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if this error is a network error.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::HttpStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_code_and_body() {
        let err = UpdateError::HttpStatus {
            url: "https://api.github.com/repos/a/b/releases/latest".to_string(),
            status: 404,
            body: r#"{"message":"Not Found"}"#.to_string(),
        };
        assert_eq!(err.code(), ErrorCode::Status(404));
        assert_eq!(err.raw_body(), Some(r#"{"message":"Not Found"}"#));
        assert!(!err.is_retriable());
        assert!(err.is_network_error());
    }

    #[test]
    fn test_transport_is_retriable() {
        let err = UpdateError::Transport {
            url: "https://example.com".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.code().to_string(), "transport");
        assert!(err.is_retriable());
        assert_eq!(err.raw_body(), None);
    }

    #[test]
    fn test_server_errors_are_retriable() {
        let err = UpdateError::HttpStatus {
            url: "u".to_string(),
            status: 502,
            body: String::new(),
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn test_filesystem_display_includes_path() {
        let err = UpdateError::fs(
            "/tmp/ghpull/widget.zip",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code(), ErrorCode::Named("filesystem"));
        assert!(err.to_string().contains("/tmp/ghpull/widget.zip"));
    }
}
