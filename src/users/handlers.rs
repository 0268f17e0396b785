use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{CaptureRequest, CapturedResponse, UpdateProfileRequest, UserResponse};
use super::model::UserPatch;
use crate::{
    auth::{
        dto::present,
        extractors::{ApiJson, AuthUser},
        password::{hash_password, is_strong},
    },
    error::ApiError,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/captured", get(get_captured))
        .route("/capture", post(set_capture))
        .route("/:id", put(update_profile))
}

#[instrument(skip(state, caller, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = state
        .directory
        .find_by_id(&id)
        .await
        .ok_or(ApiError::UserNotFound)?;
    if target.id != caller.id {
        warn!(caller = %caller.id, target_id = %target.id, "profile update on another account");
        return Err(ApiError::Forbidden);
    }

    let mut patch = UserPatch {
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
        let user = state.directory.update(&id, patch).await?;
        state.mirror.upsert(&user);
        info!(user_id = %user.id, "profile updated");
        user
    };

    Ok(Json(UserResponse {
        ok: true,
        data: user.into(),
    }))
}

#[instrument(skip(caller))]
pub async fn get_captured(AuthUser(caller): AuthUser) -> Json<CapturedResponse> {
    Json(CapturedResponse {
        ok: true,
        captured: caller.captured.into_iter().collect(),
    })
}

#[instrument(skip(state, caller, payload))]
pub async fn set_capture(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(payload): ApiJson<CaptureRequest>,
) -> Result<Json<CapturedResponse>, ApiError> {
    let (Some(pokemon_id), Some(capture)) = (payload.pokemon_id, payload.capture) else {
        return Err(ApiError::MissingFields);
    };
    let (user, captured) = state
        .directory
        .set_capture(&caller.id, pokemon_id, capture)
        .await?;
    state.mirror.upsert(&user);
    info!(user_id = %user.id, pokemon_id, capture, "capture updated");
    Ok(Json(CapturedResponse {
        ok: true,
        captured: captured.into_iter().collect(),
    }))
}
