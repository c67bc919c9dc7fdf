// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-guarded endpoints.
//!
//! Authorization is a flat role match: `/admin/dashboard` admits `admin`,
//! `/admin/users` admits `admin` and `moderator`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, AuthError, Profile, StaffOnly},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub message: String,
}

/// Admin dashboard greeting.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin"),
    )
)]
pub async fn dashboard(admin: AdminOnly) -> Json<DashboardResponse> {
    tracing::debug!(user_id = %admin.identity().subject_id, "Admin dashboard");
    Json(DashboardResponse {
        message: "Welcome to admin dashboard".to_string(),
    })
}

/// All accounts, newest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Accounts", body = [Profile]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires admin or moderator"),
    )
)]
pub async fn list_users(
    _staff: StaffOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, AuthError> {
    Ok(Json(state.issuer.list_users().await?))
}
