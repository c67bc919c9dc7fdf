// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Every failure an auth operation reports to a caller. Variants never carry
/// details that would let a caller tell "unknown email" from "wrong password",
/// and `InternalFailure` detail is logged but never rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email/password or provider credential rejected
    InvalidCredentials,
    /// Refresh token failed verification (signature, expiry or payload)
    InvalidRefreshToken,
    /// Provider token was issued for another client
    AudienceMismatch,
    /// Provider token has expired
    Expired,
    /// Email already belongs to another account
    EmailConflict,
    /// Account no longer exists
    NotFound,
    /// Bearer token missing, invalid or expired
    Unauthorized,
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Role does not match the endpoint's allowed roles
    InsufficientPermissions,
    /// Request body failed validation
    InvalidInput(String),
    /// Store, provider or signing failure
    InternalFailure(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Build an internal failure, logging the detail server-side.
    pub fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        tracing::error!(context, error = %detail, "Internal authentication failure");
        AuthError::InternalFailure(format!("{context}: {detail}"))
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::Expired => "token_expired",
            AuthError::EmailConflict => "email_conflict",
            AuthError::NotFound => "not_found",
            AuthError::Unauthorized => "unauthorized",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::InternalFailure(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::Expired
            | AuthError::Unauthorized
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader => StatusCode::UNAUTHORIZED,
            AuthError::AudienceMismatch | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailConflict => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            AuthError::AudienceMismatch => write!(f, "Token audience mismatch"),
            AuthError::Expired => write!(f, "Token has expired"),
            AuthError::EmailConflict => write!(f, "Email already exists"),
            AuthError::NotFound => write!(f, "User not found"),
            AuthError::Unauthorized => write!(f, "Unauthorized"),
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::InvalidInput(msg) => write!(f, "{msg}"),
            // Detail stays in the logs
            AuthError::InternalFailure(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_credentials_returns_401() {
        let (status, body) = body_of(AuthError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn internal_failure_hides_detail() {
        let (status, body) =
            body_of(AuthError::InternalFailure("db password is hunter2".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::EmailConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(AuthError::AudienceMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
