//! API error taxonomy and HTTP status classification

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by every remote operation
///
/// Variants that can carry a server-provided `{error}` message keep it as
/// `Option<String>` so callers can tell a real message from a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Malformed input, rejected locally or by the server
    #[error("{}", .0.as_deref().unwrap_or("invalid request"))]
    Validation(Option<String>),

    /// Token missing, expired or rejected, or bad credentials on login
    #[error("{}", .0.as_deref().unwrap_or("not authenticated"))]
    Auth(Option<String>),

    /// Target project doesn't exist or doesn't belong to the caller
    #[error("{}", .0.as_deref().unwrap_or("project not found"))]
    NotFound(Option<String>),

    /// Transport failure: timeout, DNS, connection refused
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("server error ({status}): {}", .message.as_deref().unwrap_or("unexpected response"))]
    Server { status: u16, message: Option<String> },

    /// Success status with a body we couldn't decode
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Local validation failure with a fixed message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(Some(message.into()))
    }

    /// The `{error}` message the server sent, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Validation(m) | Self::Auth(m) | Self::NotFound(m) => m.as_deref(),
            Self::Server { message, .. } => message.as_deref(),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Whether this error ends the monitoring session
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Which family of endpoint produced a status, since 4xx means different
/// things on the auth routes than on the project routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    /// `/auth/*`: every client error is a credentials problem
    Auth,
    /// `/projects/list`, `/projects/create`
    Collection,
    /// `/projects/{id}`
    Item,
}

/// Map a non-success status and optional `{error}` message to an ApiError
pub(crate) fn classify(status: StatusCode, message: Option<String>, endpoint: Endpoint) -> ApiError {
    match (endpoint, status.as_u16()) {
        (Endpoint::Auth, 400 | 401 | 403 | 409 | 422) => ApiError::Auth(message),
        (_, 401) => ApiError::Auth(message),
        (Endpoint::Item, 403) => ApiError::NotFound(message),
        (_, 403) => ApiError::Auth(message),
        (_, 404) => ApiError::NotFound(message),
        (_, 400 | 409 | 422) => ApiError::Validation(message),
        (_, status) => ApiError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_auth_everywhere() {
        for endpoint in [Endpoint::Auth, Endpoint::Collection, Endpoint::Item] {
            assert!(classify(StatusCode::UNAUTHORIZED, None, endpoint).is_auth());
        }
    }

    #[test]
    fn test_auth_endpoints_treat_conflict_as_auth() {
        let err = classify(
            StatusCode::CONFLICT,
            Some("User already exists".into()),
            Endpoint::Auth,
        );
        assert_eq!(err, ApiError::Auth(Some("User already exists".into())));
    }

    #[test]
    fn test_project_endpoints() {
        assert!(classify(StatusCode::NOT_FOUND, None, Endpoint::Item).is_not_found());
        assert!(classify(StatusCode::FORBIDDEN, None, Endpoint::Item).is_not_found());
        assert!(classify(StatusCode::FORBIDDEN, None, Endpoint::Collection).is_auth());
        assert_eq!(
            classify(StatusCode::BAD_REQUEST, None, Endpoint::Collection),
            ApiError::Validation(None)
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, None, Endpoint::Collection),
            ApiError::Server {
                status: 502,
                message: None
            }
        );
    }

    #[test]
    fn test_server_message_only_when_sent() {
        assert_eq!(
            ApiError::Validation(Some("URL is required".into())).server_message(),
            Some("URL is required")
        );
        assert_eq!(ApiError::NotFound(None).server_message(), None);
        assert_eq!(ApiError::Network("refused".into()).server_message(), None);
        assert_eq!(ApiError::NotFound(None).to_string(), "project not found");
    }
}
