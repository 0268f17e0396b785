use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Emails are compared trimmed and lower-cased everywhere.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

/// Outstanding password-reset code. Code and expiry only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCode {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// User record held by the directory. Not serializable on purpose: anything
/// leaving the process goes through [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub last_login_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub captured: BTreeSet<u32>,
    pub reset: Option<ResetCode>,
}

impl User {
    pub fn new(
        email: &str,
        password_hash: String,
        first_name: String,
        last_name: String,
        role: Role,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            password_hash,
            first_name,
            last_name,
            role,
            last_login_at: now,
            created_at: now,
            captured: BTreeSet::new(),
            reset: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Client-facing view of a user.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub last_login_at: OffsetDateTime,
    pub captured: Vec<u32>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            role: u.role,
            last_login_at: u.last_login_at,
            captured: u.captured.iter().copied().collect(),
        }
    }
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        PublicUser::from(&u)
    }
}

/// Partial update. `None` leaves the field alone.
#[derive(Debug, Default, Clone)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub last_login_at: Option<OffsetDateTime>,
    /// `Some(None)` clears an outstanding code.
    pub reset: Option<Option<ResetCode>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.password_hash.is_none()
            && self.last_login_at.is_none()
            && self.reset.is_none()
    }
}
