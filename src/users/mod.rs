use crate::state::AppState;
use axum::Router;

pub mod admin;
pub mod directory;
pub mod dto;
pub mod handlers;
pub mod model;
pub mod services;

/// Everything mounted under `/user`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(crate::auth::router())
        .merge(admin::admin_routes())
        .merge(handlers::profile_routes())
}
