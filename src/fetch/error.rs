//! Failure taxonomy for provider requests
//!
//! `ErrorKind` is the pure tag used for retry decisions and persisted with
//! failed-request records. `FetchError` is what the fetch client returns: a
//! classified, per-item failure or a fatal connection failure.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of per-item failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP 401
    Unauthorized,
    /// HTTP 403
    Forbidden,
    /// HTTP 404
    NotFound,
    /// HTTP 429 that did not clear within the attempt ceiling
    TooManyRequests,
    /// HTTP 5xx
    ServerError,
    /// Any other non-2xx status
    UnknownClientOrServerError,
    /// Every attempt timed out
    RequestTimeout,
    /// Store envelope answered `success: false`
    ResponseRejected,
    /// 2xx body that is not JSON or lacks the expected shape
    MalformedResponse,
}

impl ErrorKind {
    /// Maps a non-2xx HTTP status to its kind
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::TooManyRequests,
            500..=599 => Self::ServerError,
            _ => Self::UnknownClientOrServerError,
        }
    }

    /// Hard failures will not heal by asking again later, so the item is
    /// skipped by regular runs until an explicit repair pass
    pub fn is_hard(&self) -> bool {
        !matches!(
            self,
            Self::TooManyRequests | Self::ServerError | Self::RequestTimeout
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::TooManyRequests => "too_many_requests",
            Self::ServerError => "server_error",
            Self::UnknownClientOrServerError => "unknown_client_or_server_error",
            Self::RequestTimeout => "request_timeout",
            Self::ResponseRejected => "response_rejected",
            Self::MalformedResponse => "malformed_response",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unauthorized" => Some(Self::Unauthorized),
            "forbidden" => Some(Self::Forbidden),
            "not_found" => Some(Self::NotFound),
            "too_many_requests" => Some(Self::TooManyRequests),
            "server_error" => Some(Self::ServerError),
            "unknown_client_or_server_error" => Some(Self::UnknownClientOrServerError),
            "request_timeout" => Some(Self::RequestTimeout),
            "response_rejected" => Some(Self::ResponseRejected),
            "malformed_response" => Some(Self::MalformedResponse),
            _ => None,
        }
    }

    /// Kinds that regular runs never retry automatically
    pub fn hard_kinds() -> Vec<Self> {
        Self::all_kinds()
            .into_iter()
            .filter(|kind| kind.is_hard())
            .collect()
    }

    pub fn all_kinds() -> Vec<Self> {
        vec![
            Self::Unauthorized,
            Self::Forbidden,
            Self::NotFound,
            Self::TooManyRequests,
            Self::ServerError,
            Self::UnknownClientOrServerError,
            Self::RequestTimeout,
            Self::ResponseRejected,
            Self::MalformedResponse,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Errors returned by the fetch client
#[derive(Debug, Error)]
pub enum FetchError {
    /// Terminal for the current item; recorded as a failed request
    #[error("{kind} from {url}")]
    Classified {
        kind: ErrorKind,
        status: Option<u16>,
        url: String,
    },

    /// The response arrived but could not be decoded
    #[error("malformed response from {url} (HTTP {status}): {detail}")]
    Malformed {
        url: String,
        status: u16,
        detail: String,
    },

    /// Connection-level failure that outlasted the retry ceiling; fatal
    #[error("connection to {url} failed after waiting {waited_ms}ms: {source}")]
    Connection {
        url: String,
        waited_ms: u64,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn from_status(url: &str, status: StatusCode) -> Self {
        Self::Classified {
            kind: ErrorKind::from_status(status.as_u16()),
            status: Some(status.as_u16()),
            url: url.to_string(),
        }
    }

    pub fn timeout(url: &str) -> Self {
        Self::Classified {
            kind: ErrorKind::RequestTimeout,
            status: None,
            url: url.to_string(),
        }
    }

    /// A transport failure that is neither a timeout nor a connection problem
    pub fn transport(url: &str, error: &reqwest::Error) -> Self {
        Self::Classified {
            kind: ErrorKind::UnknownClientOrServerError,
            status: error.status().map(|s| s.as_u16()),
            url: url.to_string(),
        }
    }

    /// The persisted kind, or `None` for fatal connection failures
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified { kind, .. } => Some(*kind),
            Self::Malformed { .. } => Some(ErrorKind::MalformedResponse),
            Self::Connection { .. } => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Classified { status, .. } => *status,
            Self::Malformed { status, .. } => Some(*status),
            Self::Connection { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Forbidden);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::TooManyRequests);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServerError);
        assert_eq!(
            ErrorKind::from_status(418),
            ErrorKind::UnknownClientOrServerError
        );
        assert_eq!(
            ErrorKind::from_status(302),
            ErrorKind::UnknownClientOrServerError
        );
    }

    #[test]
    fn test_hard_kinds() {
        assert!(ErrorKind::NotFound.is_hard());
        assert!(ErrorKind::ResponseRejected.is_hard());
        assert!(ErrorKind::MalformedResponse.is_hard());

        assert!(!ErrorKind::ServerError.is_hard());
        assert!(!ErrorKind::RequestTimeout.is_hard());
        assert!(!ErrorKind::TooManyRequests.is_hard());

        assert_eq!(ErrorKind::hard_kinds().len(), 6);
    }

    #[test]
    fn test_error_kind_roundtrip() {
        for kind in ErrorKind::all_kinds() {
            assert_eq!(ErrorKind::from_db_string(kind.to_db_string()), Some(kind));
        }
        assert_eq!(ErrorKind::from_db_string("failed"), None);
    }

    #[test]
    fn test_fetch_error_accessors() {
        let err = FetchError::from_status("https://example.com/1", StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.status_code(), Some(404));
        assert!(!err.is_fatal());

        let err = FetchError::timeout("https://example.com/1");
        assert_eq!(err.kind(), Some(ErrorKind::RequestTimeout));
        assert_eq!(err.status_code(), None);

        let err = FetchError::Malformed {
            url: "https://example.com/1".to_string(),
            status: 200,
            detail: "expected value".to_string(),
        };
        assert_eq!(err.kind(), Some(ErrorKind::MalformedResponse));
        assert_eq!(err.status_code(), Some(200));
    }
}
