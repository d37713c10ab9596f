// Error taxonomy surfaced to callers of the API client

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Why an expired access token could not be replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExpiry {
    /// No refresh token in the credential store
    MissingRefreshToken,
    /// The refresh endpoint answered 401
    RefreshRejected,
    /// The refresh call failed any other way (transport, 5xx, bad payload, storage)
    RefreshFailed(String),
}

impl fmt::Display for SessionExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionExpiry::MissingRefreshToken => write!(f, "no refresh token stored"),
            SessionExpiry::RefreshRejected => write!(f, "refresh token rejected"),
            SessionExpiry::RefreshFailed(reason) => write!(f, "token refresh failed: {}", reason),
        }
    }
}

/// A request that did not produce a successful response
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// The backend answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Network, timeout or protocol error before a response arrived
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RequestFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestFailure::Status { status, .. } => Some(*status),
            RequestFailure::Transport(e) => e.status(),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            RequestFailure::Status { body, .. } => Some(body),
            RequestFailure::Transport(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestFailure::Transport(e) if e.is_timeout())
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, RequestFailure::Transport(e) if e.is_connect())
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-401 HTTP error, a 401 on an already retried request, or a
    /// transport failure. Passed through unchanged, never retried.
    #[error("request failed: {0}")]
    RequestFailed(#[from] RequestFailure),

    /// A 401 that refreshing could not resolve. Stored credentials have been
    /// cleared; `body` is the body of the original 401 response.
    #[error("session expired ({reason})")]
    SessionExpired { reason: SessionExpiry, body: String },

    /// The underlying reqwest client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("credential store error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// HTTP status behind the error, if the backend answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RequestFailed(failure) => failure.status(),
            ApiError::SessionExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::RequestFailed(RequestFailure::Transport(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_failure_reports_status_and_body() {
        let err = ApiError::from(RequestFailure::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        });
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!err.is_session_expired());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_session_expired_is_unauthorized() {
        let err = ApiError::SessionExpired {
            reason: SessionExpiry::RefreshRejected,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(err.is_session_expired());
        assert_eq!(err.to_string(), "session expired (refresh token rejected)");
    }
}
