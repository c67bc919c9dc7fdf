// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `reqwest` implementation of [`AuthTransport`] against the session API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

use crate::api::{GOOGLE_LOGIN_PATH, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use crate::auth::{AccessTokenResponse, LoginResponse};

use super::transport::{ApiRequest, ApiResponse, AuthTransport, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// `base_url` may carry a path prefix; API paths are resolved below it.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url: with_trailing_slash(base_url),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Network(format!("invalid endpoint {path}: {e}")))
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.endpoint(&request.path)?);
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        // Empty and non-JSON bodies (204, proxies) read as null
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok(ApiResponse { status, body })
    }

    async fn post_expecting<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, TransportError> {
        let response = self.dispatch(&ApiRequest::post(path, body), None).await?;
        if !response.is_success() {
            return Err(response.into_rejection());
        }
        response.json()
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, TransportError> {
        self.post_expecting(LOGIN_PATH, json!({"email": email, "password": password}))
            .await
    }

    async fn google_login(&self, credential: &str) -> Result<LoginResponse, TransportError> {
        self.post_expecting(GOOGLE_LOGIN_PATH, json!({"credential": credential}))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, TransportError> {
        self.post_expecting(REFRESH_PATH, json!({"refreshToken": refresh_token}))
            .await
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), TransportError> {
        let response = self
            .dispatch(&ApiRequest::post(LOGOUT_PATH, json!({})), access_token)
            .await?;
        if !response.is_success() {
            return Err(response.into_rejection());
        }
        Ok(())
    }

    async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        self.dispatch(request, access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, REGISTER_PATH};
    use crate::auth::Role;
    use crate::client::{
        BrowserContext, ClientError, MemoryNavigator, RefreshCoordinator, SessionState,
    };
    use crate::state::tests::test_state;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn serve() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(test_state())).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[test]
    fn endpoints_resolve_below_prefix() {
        let transport =
            HttpTransport::new(Url::parse("https://example.com/api").unwrap()).unwrap();
        assert_eq!(
            transport.endpoint(LOGIN_PATH).unwrap().as_str(),
            "https://example.com/api/auth/login"
        );
    }

    #[tokio::test]
    async fn coordinator_runs_against_live_router() {
        let base = serve().await;
        let transport = Arc::new(HttpTransport::new(base).unwrap());
        let context = BrowserContext::new();
        let navigator = Arc::new(MemoryNavigator::new("/dashboard"));
        let tab = RefreshCoordinator::for_tab(context.open_tab(), transport.clone(), navigator);

        let registered = tab
            .execute(ApiRequest::post(
                REGISTER_PATH,
                json!({"email": "Ada@Example.com", "password": "correct horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(registered.status, 201);

        let err = tab.login("ada@example.com", "wrong password").await.unwrap_err();
        match err {
            ClientError::Transport(TransportError::Rejected { status, code, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(code.as_deref(), Some("invalid_credentials"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let user = tab.login("ada@example.com", "correct horse").await.unwrap();
        assert_eq!(user.role, Role::user());
        assert_eq!(tab.fetch_profile().await.unwrap().identity.email, "ada@example.com");

        let forbidden = tab.execute(ApiRequest::get("/admin/users")).await.unwrap();
        assert_eq!(forbidden.status, 403);

        // A second tab restores the session from the shared refresh token
        let sibling = RefreshCoordinator::for_tab(
            context.open_tab(),
            transport,
            Arc::new(MemoryNavigator::new("/dashboard")),
        );
        assert_eq!(sibling.bootstrap().await, SessionState::Authenticated);
        assert_eq!(sibling.user().unwrap().email, "ada@example.com");

        tab.logout().await;
        assert_eq!(tab.state(), SessionState::Anonymous);
        assert!(context.storage().peek(crate::client::REFRESH_TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let transport =
            HttpTransport::new(Url::parse("http://127.0.0.1:1").unwrap()).unwrap();
        let err = transport.refresh("r").await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
