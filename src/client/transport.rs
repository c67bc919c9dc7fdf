// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network port used by the refresh coordinator.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{AccessTokenResponse, LoginResponse};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// An API call routed through the coordinator.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Set once the request has been replayed after a refresh
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::POST, path)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_value(self.body.clone()).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Convert a non-success response into [`TransportError::Rejected`].
    pub fn into_rejection(self) -> TransportError {
        let message = self
            .body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.status));
        let code = self
            .body
            .get("error_code")
            .and_then(Value::as_str)
            .map(str::to_string);
        TransportError::Rejected {
            status: self.status,
            code,
            message,
        }
    }
}

#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, TransportError>;

    async fn google_login(&self, credential: &str) -> Result<LoginResponse, TransportError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, TransportError>;

    async fn logout(&self, access_token: Option<&str>) -> Result<(), TransportError>;

    /// Send an arbitrary API call. Every status, 401 included, is `Ok`.
    async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejection_reads_error_body() {
        let response = ApiResponse {
            status: 401,
            body: json!({"error": "Invalid credentials", "error_code": "invalid_credentials"}),
        };
        assert!(response.is_unauthorized());
        assert_eq!(
            response.into_rejection(),
            TransportError::Rejected {
                status: 401,
                code: Some("invalid_credentials".to_string()),
                message: "Invalid credentials".to_string(),
            }
        );
    }

    #[test]
    fn rejection_without_body_uses_status() {
        let response = ApiResponse {
            status: 502,
            body: Value::Null,
        };
        assert_eq!(response.into_rejection().to_string(), "HTTP 502");
    }
}
