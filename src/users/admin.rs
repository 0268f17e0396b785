use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::directory::DirectoryError;
use super::dto::{AdminUpdateRequest, UserResponse, UsersResponse};
use super::model::{PublicUser, UserPatch};
use crate::{
    auth::{
        dto::{present, MessageResponse},
        extractors::{AdminUser, ApiJson},
        password::{hash_password, is_strong},
    },
    error::ApiError,
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", put(update_user))
        .route("/admin/delete/:id", post(delete_user))
}

#[instrument(skip(state, admin))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Json<UsersResponse> {
    let data: Vec<PublicUser> = state.directory.list().await.iter().map(PublicUser::from).collect();
    info!(admin = %admin.id, count = data.len(), "admin listed users");
    Json(UsersResponse { ok: true, data })
}

#[instrument(skip(state, admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<AdminUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = state
        .directory
        .find_by_id(&id)
        .await
        .ok_or(ApiError::UserNotFound)?;

    let mut patch = UserPatch {
        email: present(&payload.email).map(str::to_string),
        first_name: present(&payload.first_name).map(|s| s.trim().to_string()),
        last_name: present(&payload.last_name).map(|s| s.trim().to_string()),
        ..Default::default()
    };
    if let Some(password) = payload.password.as_deref().filter(|p| !p.is_empty()) {
        if !is_strong(password) {
            return Err(ApiError::InvalidPassword);
        }
        patch.password_hash = Some(hash_password(password)?);
    }

    let user = if patch.is_empty() {
        target
    } else {
        let user = state.directory.update(&id, patch).await.map_err(|e| match e {
            DirectoryError::Conflict => ApiError::EmailExists,
            other => ApiError::from(other),
        })?;
        state.mirror.upsert(&user);
        info!(admin = %admin.id, user_id = %user.id, "admin updated user");
        user
    };

    Ok(Json(UserResponse {
        ok: true,
        data: user.into(),
    }))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = id.trim();
    let removed = state.directory.delete(id).await.map_err(|e| match e {
        DirectoryError::Forbidden => {
            warn!(admin = %admin.id, target_id = %id, "refused to delete admin account");
            ApiError::CannotDeleteAdmin
        }
        other => ApiError::from(other),
    })?;
    state.mirror.delete(&removed.id);
    info!(admin = %admin.id, user_id = %removed.id, "admin deleted user");
    Ok(Json(MessageResponse::ok("User deleted")))
}
