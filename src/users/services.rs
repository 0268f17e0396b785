use tracing::{debug, info};

use crate::state::AppState;
use crate::users::model::{normalize_email, User};

/// Directory lookup with read-through to the mirror. A mirror hit is cached
/// in the directory before being returned.
pub async fn find_by_email(state: &AppState, email: &str) -> Option<User> {
    let email = normalize_email(email);
    if let Some(user) = state.directory.find_by_email(&email).await {
        return Some(user);
    }
    let user = state.mirror.find_by_email(&email).await?;
    let user = state.directory.cache(user).await?;
    info!(user_id = %user.id, "user restored from mirror");
    Some(user)
}

pub async fn find_by_id(state: &AppState, id: &str) -> Option<User> {
    if let Some(user) = state.directory.find_by_id(id).await {
        return Some(user);
    }
    let user = state.mirror.find_by_id(id).await?;
    let user = state.directory.cache(user).await?;
    debug!(user_id = %user.id, "user restored from mirror by id");
    Some(user)
}
