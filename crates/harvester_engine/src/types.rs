use std::fmt;

/// A page fetch that did not produce a usable page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderFailure,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    /// The provider refused the request (quota, denied key, bot wall).
    Blocked,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    /// The body arrived but could not be understood.
    Malformed,
    /// The cursor was not issued by this source.
    InvalidCursor,
    Network,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::InvalidUrl => write!(f, "invalid url"),
            ProviderFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ProviderFailure::Timeout => write!(f, "timeout"),
            ProviderFailure::Blocked => write!(f, "request blocked"),
            ProviderFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            ProviderFailure::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            ProviderFailure::Malformed => write!(f, "malformed response"),
            ProviderFailure::InvalidCursor => write!(f, "invalid cursor"),
            ProviderFailure::Network => write!(f, "network error"),
        }
    }
}
