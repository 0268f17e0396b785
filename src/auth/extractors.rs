use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::jwt::JwtKeys;
use crate::{error::ApiError, state::AppState, users::model::User, users::services};

/// Verified caller, resolved to its directory record.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::NoToken)?;

        // Expect "Bearer <token>"; a bare scheme carries no token.
        let token = match auth.trim_end() {
            "Bearer" | "bearer" => return Err(ApiError::NoToken),
            _ => auth
                .strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
                .ok_or_else(|| ApiError::InvalidToken("invalid auth scheme".into()))?
                .trim(),
        };
        if token.is_empty() {
            return Err(ApiError::NoToken);
        }

        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            ApiError::from(e)
        })?;

        let user = services::find_by_id(state, &user_id).await.ok_or_else(|| {
            warn!(user_id = %user_id, "token for unknown user");
            ApiError::TokenUserNotFound
        })?;

        Ok(AuthUser(user))
    }
}

/// Caller holding the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!(user_id = %user.id, "admin route refused");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

/// `Json<T>` whose rejections render through `ApiError`.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                debug!(status = %rejection.status(), "json body rejected");
                Err(ApiError::InvalidBody(rejection.body_text()))
            }
        }
    }
}
