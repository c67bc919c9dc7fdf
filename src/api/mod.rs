// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AccessTokenResponse, Identity, LoginResponse, Profile, Role},
    error::ApiError,
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod users;

/// Paths the browser client must never answer with refresh-and-retry.
pub const LOGIN_PATH: &str = "/auth/login";
pub const GOOGLE_LOGIN_PATH: &str = "/auth/google";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const PROFILE_PATH: &str = "/auth/profile";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REGISTER_PATH: &str = "/user/register";

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route(LOGIN_PATH, post(auth::login))
        .route(GOOGLE_LOGIN_PATH, post(auth::google_login))
        .route(REFRESH_PATH, post(auth::refresh))
        .route(PROFILE_PATH, get(auth::profile))
        .route(LOGOUT_PATH, post(auth::logout))
        .route(REGISTER_PATH, post(users::register))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::list_users))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .fallback(|| async { ApiError::not_found("Route not found") })
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::google_login,
        auth::refresh,
        auth::profile,
        auth::logout,
        users::register,
        admin::dashboard,
        admin::list_users,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            Identity,
            Profile,
            Role,
            LoginResponse,
            AccessTokenResponse,
            auth::LoginRequest,
            auth::GoogleLoginRequest,
            auth::RefreshRequest,
            users::RegisterRequest,
            users::RegisterResponse,
            admin::DashboardResponse,
            health::ReadyResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Login, token refresh and profile"),
        (name = "Users", description = "Account registration"),
        (name = "Admin", description = "Role-guarded administration"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;
