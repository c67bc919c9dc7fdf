// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints: login, Google login, refresh, profile, logout.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AccessTokenResponse, Auth, AuthError, LoginResponse, OptionalAuth, Profile};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GoogleLoginRequest {
    /// Google ID token obtained by the browser
    pub credential: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.issuer.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

/// Log in with a Google ID token.
#[utoipa::path(
    post,
    path = "/auth/google",
    tag = "Auth",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Tokens issued", body = LoginResponse),
        (status = 400, description = "Token issued for another client"),
        (status = 401, description = "Credential rejected or expired"),
        (status = 409, description = "Concurrent first-time login created the account"),
    )
)]
pub async fn google_login(
    State(state): State<AppState>,
    Json(request): Json<GoogleLoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let response = state.issuer.federated_login(&request.credential).await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid refresh token"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AuthError> {
    let response = state.issuer.refresh(&request.refresh_token)?;
    Ok(Json(response))
}

/// Profile of the bearer's account.
#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account profile", body = Profile),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Account no longer exists"),
    )
)]
pub async fn profile(
    Auth(identity): Auth,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AuthError> {
    let profile = state.issuer.get_profile(&identity.subject_id).await?;
    Ok(Json(profile))
}

/// Acknowledge a logout.
///
/// Tokens are stateless, so there is nothing to revoke; clients discard their
/// tokens locally. The call exists so clients can log out uniformly.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(OptionalAuth(identity): OptionalAuth) -> StatusCode {
    if let Some(identity) = identity {
        tracing::info!(user_id = %identity.subject_id, "Logout");
    }
    StatusCode::NO_CONTENT
}
