// File: ./src/client/error.rs
use std::fmt;

/// Errors surfaced by `ApiClient`. HTTP error statuses are not errors; they
/// come back as ordinary responses.
#[derive(Debug)]
pub enum ApiError {
    InvalidUrl(String),
    InvalidRequest(String),
    InvalidHeader(String),
    Serialize(String),
    /// Connection, TLS or protocol failure before a response arrived.
    Transport(String),
    /// The response body could not be read to the end.
    Body(String),
    /// The response body was not the expected JSON.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            ApiError::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            ApiError::InvalidHeader(e) => write!(f, "Invalid header: {}", e),
            ApiError::Serialize(e) => write!(f, "Failed to encode request body: {}", e),
            ApiError::Transport(e) => write!(f, "Request failed: {}", e),
            ApiError::Body(e) => write!(f, "Failed to read response body: {}", e),
            ApiError::Decode(e) => write!(f, "Failed to decode response: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<hyper_util::client::legacy::Error> for ApiError {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<hyper::Error> for ApiError {
    fn from(e: hyper::Error) -> Self {
        Self::Body(e.to_string())
    }
}

impl From<http::Error> for ApiError {
    fn from(e: http::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<http::uri::InvalidUri> for ApiError {
    fn from(e: http::uri::InvalidUri) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
