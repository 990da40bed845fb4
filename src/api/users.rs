// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! User profile endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{UserRecord, UserRepository},
};

/// Request to update the caller's profile.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    /// New display name; null clears it.
    pub name: Option<String>,
}

/// Get the authenticated user's profile, creating it on first sight.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = UserRecord),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserRecord>, ApiError> {
    let repo = UserRepository::new(state.storage());
    let record = repo
        .ensure(&user.user_id, user.name.as_deref())
        .map_err(|e| ApiError::internal(format!("Failed to load user: {e}")))?;
    Ok(Json(record))
}

/// Update the authenticated user's profile.
#[utoipa::path(
    put,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserRecord),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_me(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserRecord>, ApiError> {
    let repo = UserRepository::new(state.storage());
    repo.ensure(&user.user_id, user.name.as_deref())
        .map_err(|e| ApiError::internal(format!("Failed to load user: {e}")))?;

    let record = repo
        .set_name(&user.user_id, request.name)
        .map_err(|e| ApiError::internal(format!("Failed to update user: {e}")))?;
    Ok(Json(record))
}
