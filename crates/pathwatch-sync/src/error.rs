//! Error types for the synchronizer channels.
//!
//! [`FetchError`] is the only error that ever reaches the display layer,
//! and only through its [`ErrorKind`] category. Push-side errors
//! ([`FrameError`], [`PushError`]) are absorbed at the push boundary and
//! logged.

use std::fmt;

/// Category of a failed fetch, as shown to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure, timeout, or interrupted body.
    Network,
    /// The backend rejected the credentials (401 or 403).
    Unauthorized,
    /// The response body did not match the expected shape.
    Decode,
    /// Anything else, including unexpected status codes.
    Unknown,
}

impl ErrorKind {
    /// Short lowercase label for logs and status lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::Decode => "decode",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed fetch exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the credentials.
    #[error("unauthorized: backend returned {status}")]
    Unauthorized {
        /// HTTP status code returned by the backend.
        status: u16,
    },

    /// The body could not be decoded into the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Uncategorized failure.
    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl FetchError {
    /// The display category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// An inbound push frame that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame was not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame was valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// The push-channel address could not be derived.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The base URL did not parse.
    #[error("invalid stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL scheme has no streaming equivalent.
    #[error("unsupported scheme for event stream: {0}")]
    UnsupportedScheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_kinds() {
        assert_eq!(FetchError::Network("x".to_owned()).kind(), ErrorKind::Network);
        assert_eq!(
            FetchError::Unauthorized { status: 401 }.kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(FetchError::Decode("x".to_owned()).kind(), ErrorKind::Decode);
        assert_eq!(FetchError::Unknown("x".to_owned()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn serde_errors_are_decode_errors() {
        let err = serde_json::from_str::<u32>("\"nope\"").err();
        let fetch_err = err.map(FetchError::from);
        assert_eq!(fetch_err.map(|e| e.kind()), Some(ErrorKind::Decode));
    }
}
