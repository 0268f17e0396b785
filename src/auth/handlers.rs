use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            present, AuthResponse, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest,
            SigninRequest, SignupRequest,
        },
        extractors::ApiJson,
        reset, services,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (token, user) = services::signup(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            ok: true,
            token,
            data: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SigninRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (token, user) = services::signin(&state, payload).await?;
    Ok(Json(AuthResponse {
        ok: true,
        token,
        data: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = present(&payload.email).ok_or(ApiError::MissingFields)?;
    reset::request_reset(&state, email).await?;
    Ok(Json(MessageResponse::ok(
        "If this account exists, a reset code has been sent",
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let code = payload.code_text().filter(|c| !c.is_empty());
    let (Some(email), Some(code), Some(new_password)) =
        (present(&payload.email), code, present(&payload.new_password))
    else {
        return Err(ApiError::MissingFields);
    };
    reset::confirm_reset(&state, email, &code, new_password).await?;
    Ok(Json(MessageResponse::ok("Password updated")))
}
