use serde::{Deserialize, Serialize};

use crate::users::model::PublicUser;

/// Request body for signup. Fields are optional so that a missing field
/// maps to `MISSING_FIELDS` instead of a JSON rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request body for signin.
#[derive(Debug, Default, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response returned after signup or signin.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub token: String,
    pub data: PublicUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    /// Clients send the code either as a string or as a number.
    pub code: Option<serde_json::Value>,
    #[serde(rename = "newPassword")]
    pub new_password: Option<String>,
}

impl ResetPasswordRequest {
    /// The code as text. Strings are taken verbatim.
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Treats `Some("")` and whitespace-only strings as absent.
pub fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}
