//! Error types for the Vigil client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the backend, a WebDriver server or
/// the job queue
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// WebDriver server rejected a command
    #[error("WebDriver error '{error}': {message}")]
    WebDriver {
        /// W3C error code, e.g. "no such element"
        error: String,
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Reading an artifact from disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Redis command failed
    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// True when the remote end is gone rather than merely refusing a command
    ///
    /// Covers refused connections and WebDriver's "invalid session id", which
    /// is what a driver answers once the browser process has died.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::RequestFailed(e) => e.is_connect(),
            Self::WebDriver { error, .. } => error == "invalid session id",
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ClientError::api_error(404, "nope").is_client_error());
        assert!(ClientError::api_error(503, "down").is_server_error());
        assert!(!ClientError::api_error(503, "down").is_client_error());
    }

    #[test]
    fn test_invalid_session_is_connection_lost() {
        let gone = ClientError::WebDriver {
            error: "invalid session id".to_string(),
            message: "session deleted because of page crash".to_string(),
        };
        assert!(gone.is_connection_lost());

        let missing = ClientError::WebDriver {
            error: "no such element".to_string(),
            message: "#login".to_string(),
        };
        assert!(!missing.is_connection_lost());
    }
}
