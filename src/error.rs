// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request errors and the failure taxonomy used for global handling.

use reqwest::StatusCode;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors building the client. Runtime failures never use this type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("credential storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Failure categories that receive a central, app-wide reaction.
///
/// Anything not listed here (404, 409, 422, ...) is left for the calling
/// feature to interpret from the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 401: the server no longer accepts the credential.
    AuthenticationInvalid,
    /// 403: the credential is valid but lacks permission.
    AuthorizationDenied,
    /// 429
    RateLimited,
    /// 5xx
    ServerError,
    /// No HTTP status at all (DNS, refused connection, timeout).
    Unreachable,
}

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. You do not have permission for this action.";
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
pub const SERVER_ERROR_MESSAGE: &str = "The server ran into a problem. Please try again later.";
pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the server. Check your connection.";

impl FailureClass {
    /// Classify a failed request by its HTTP status, `None` meaning the
    /// request never produced a response.
    pub fn from_status(status: Option<StatusCode>) -> Option<FailureClass> {
        let Some(status) = status else {
            return Some(FailureClass::Unreachable);
        };

        match status {
            StatusCode::UNAUTHORIZED => Some(FailureClass::AuthenticationInvalid),
            StatusCode::FORBIDDEN => Some(FailureClass::AuthorizationDenied),
            StatusCode::TOO_MANY_REQUESTS => Some(FailureClass::RateLimited),
            s if s.is_server_error() => Some(FailureClass::ServerError),
            _ => None,
        }
    }

    /// The single user-facing message for this class.
    pub fn canonical_message(&self) -> &'static str {
        match self {
            FailureClass::AuthenticationInvalid => SESSION_EXPIRED_MESSAGE,
            FailureClass::AuthorizationDenied => ACCESS_DENIED_MESSAGE,
            FailureClass::RateLimited => RATE_LIMITED_MESSAGE,
            FailureClass::ServerError => SERVER_ERROR_MESSAGE,
            FailureClass::Unreachable => UNREACHABLE_MESSAGE,
        }
    }

    /// Whether this class ends the local session in addition to notifying.
    pub fn ends_session(&self) -> bool {
        matches!(self, FailureClass::AuthenticationInvalid)
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FailureClass::AuthenticationInvalid => "authentication_invalid",
            FailureClass::AuthorizationDenied => "authorization_denied",
            FailureClass::RateLimited => "rate_limited",
            FailureClass::ServerError => "server_error",
            FailureClass::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_code())
    }
}

/// Error returned to feature code for any backend call.
///
/// Global categories have already been surfaced by the classifier by the
/// time a caller sees this; the caller only handles feature-specific cases.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{method} {path} returned {status}")]
    Status {
        method: String,
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("{method} {path} failed: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    #[error("{method} {path} returned an invalid body: {message}")]
    InvalidResponse {
        method: String,
        path: String,
        message: String,
    },
}

impl RequestError {
    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Transport { .. } | RequestError::InvalidResponse { .. } => None,
        }
    }

    /// Taxonomy class for global handling.
    ///
    /// A 2xx with an undecodable body is a feature concern, not a global one.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            RequestError::Status { status, .. } => FailureClass::from_status(Some(*status)),
            RequestError::Transport { .. } => FailureClass::from_status(None),
            RequestError::InvalidResponse { .. } => None,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            RequestError::Status { path, .. }
            | RequestError::Transport { path, .. }
            | RequestError::InvalidResponse { path, .. } => path,
        }
    }

    /// Response body for status errors, e.g. form validation details.
    pub fn body(&self) -> Option<&str> {
        match self {
            RequestError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> RequestError {
        RequestError::Status {
            method: "GET".to_string(),
            path: "/workouts".to_string(),
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        }
    }

    #[test]
    fn classifies_global_statuses() {
        assert_eq!(
            status_error(401).failure_class(),
            Some(FailureClass::AuthenticationInvalid)
        );
        assert_eq!(
            status_error(403).failure_class(),
            Some(FailureClass::AuthorizationDenied)
        );
        assert_eq!(
            status_error(429).failure_class(),
            Some(FailureClass::RateLimited)
        );
        assert_eq!(
            status_error(500).failure_class(),
            Some(FailureClass::ServerError)
        );
        assert_eq!(
            status_error(503).failure_class(),
            Some(FailureClass::ServerError)
        );
    }

    #[test]
    fn other_client_errors_are_left_to_features() {
        for code in [400, 404, 409, 422] {
            assert_eq!(status_error(code).failure_class(), None, "status {code}");
        }
    }

    #[test]
    fn transport_failure_is_unreachable() {
        let err = RequestError::Transport {
            method: "GET".to_string(),
            path: "/user/me".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.failure_class(), Some(FailureClass::Unreachable));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn invalid_body_is_not_classified() {
        let err = RequestError::InvalidResponse {
            method: "GET".to_string(),
            path: "/user/me".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(err.failure_class(), None);
    }

    #[test]
    fn only_authentication_ends_session() {
        assert!(FailureClass::AuthenticationInvalid.ends_session());
        assert!(!FailureClass::AuthorizationDenied.ends_session());
        assert!(!FailureClass::ServerError.ends_session());
        assert!(!FailureClass::Unreachable.ends_session());
    }

    #[test]
    fn display_includes_path_and_status() {
        let err = status_error(404);
        assert_eq!(err.to_string(), "GET /workouts returned 404 Not Found");
        assert_eq!(err.path(), "/workouts");
    }
}
