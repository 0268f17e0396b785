use serde::{Deserialize, Serialize};

use super::model::PublicUser;

/// `PUT /user/:id` body. Empty strings mean "leave unchanged".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// `PUT /user/admin/users/:id` body.
#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub pokemon_id: Option<u32>,
    pub capture: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub ok: bool,
    pub data: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub ok: bool,
    pub data: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct CapturedResponse {
    pub ok: bool,
    pub captured: Vec<u32>,
}
