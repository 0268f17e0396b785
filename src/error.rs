use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::jwt::TokenError;
use crate::users::directory::DirectoryError;

/// Every failure a handler can return. The variant decides both the HTTP
/// status and the machine-readable `code` the mobile client switches on.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("all fields are required")]
    MissingFields,
    /// Body was not JSON, had the wrong content type, or had a field of the wrong type.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("password does not meet the strength policy")]
    InvalidPassword,
    #[error("user already exists")]
    UserExists,
    #[error("email already used by another account")]
    EmailExists,
    #[error("invalid email or password")]
    InvalidUser,
    #[error("missing bearer token")]
    NoToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Token was valid but names a user that no longer exists.
    #[error("user not found")]
    TokenUserNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("access denied")]
    Forbidden,
    #[error("the administrator account cannot be deleted")]
    CannotDeleteAdmin,
    #[error("invalid reset code")]
    InvalidCode,
    #[error("reset code expired")]
    CodeExpired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingFields => "MISSING_FIELDS",
            ApiError::InvalidBody(_) => "INVALID_BODY",
            ApiError::InvalidPassword => "INVALID_PASSWORD",
            ApiError::UserExists => "USER_EXISTS",
            ApiError::EmailExists => "EMAIL_EXISTS",
            ApiError::InvalidUser => "INVALID_USER",
            ApiError::NoToken => "NO_TOKEN",
            ApiError::InvalidToken(_) => "INVALID_TOKEN",
            ApiError::TokenUserNotFound | ApiError::UserNotFound => "USER_NOT_FOUND",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::CannotDeleteAdmin => "CANNOT_DELETE_ADMIN",
            ApiError::InvalidCode => "INVALID_CODE",
            ApiError::CodeExpired => "CODE_EXPIRED",
            ApiError::Internal(_) => "SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields
            | ApiError::InvalidBody(_)
            | ApiError::InvalidPassword
            | ApiError::InvalidCode
            | ApiError::CodeExpired => StatusCode::BAD_REQUEST,
            ApiError::InvalidUser
            | ApiError::NoToken
            | ApiError::InvalidToken(_)
            | ApiError::TokenUserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::CannotDeleteAdmin => StatusCode::FORBIDDEN,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::UserExists | ApiError::EmailExists => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::InvalidToken(e.to_string())
    }
}

impl From<DirectoryError> for ApiError {
    /// Generic mapping; call sites that need a more specific code
    /// (`USER_EXISTS` vs `EMAIL_EXISTS`) match on the error themselves.
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Conflict => ApiError::EmailExists,
            DirectoryError::NotFound => ApiError::UserNotFound,
            DirectoryError::Forbidden => ApiError::CannotDeleteAdmin,
            DirectoryError::CodeMismatch => ApiError::InvalidCode,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "ok": false,
            "code": self.code(),
            "message": message,
        }));
        (status, body).into_response()
    }
}
