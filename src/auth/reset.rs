//! Password reset by emailed 6-digit code.

use rand::{rngs::OsRng, Rng};
use time::Duration;
use tracing::{info, warn};

use crate::{
    auth::password::{hash_password, is_strong},
    error::ApiError,
    state::AppState,
    users::{
        directory::DirectoryError,
        model::{normalize_email, ResetCode, UserPatch},
        services,
    },
};

pub fn generate_code() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

/// Issue a fresh code for `email`, replacing any outstanding one, and try to
/// mail it. Unknown emails and mail failures are not reported to the caller.
pub async fn request_reset(state: &AppState, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    let Some(user) = services::find_by_email(state, &email).await else {
        info!(email = %email, "reset requested for unknown email");
        return Ok(());
    };

    let code = generate_code();
    let expires_at = state.clock.now() + Duration::minutes(state.config.reset_code_ttl_minutes);
    let user = state
        .directory
        .update(
            &user.id,
            UserPatch {
                reset: Some(Some(ResetCode {
                    code: code.clone(),
                    expires_at,
                })),
                ..Default::default()
            },
        )
        .await?;
    state.mirror.upsert(&user);

    if let Err(e) = state.mailer.send_reset_code(&user.email, &code).await {
        // The code stays valid; support can read it from here.
        warn!(error = %e, user_id = %user.id, code = %code, "reset mail failed; code logged instead");
    }
    Ok(())
}

pub async fn confirm_reset(
    state: &AppState,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let user = services::find_by_email(state, email)
        .await
        .ok_or(ApiError::UserNotFound)?;

    let Some(reset) = &user.reset else {
        return Err(ApiError::InvalidCode);
    };
    if reset.code != code {
        warn!(user_id = %user.id, "reset attempted with wrong code");
        return Err(ApiError::InvalidCode);
    }
    if state.clock.now() > reset.expires_at {
        return Err(ApiError::CodeExpired);
    }
    if !is_strong(new_password) {
        return Err(ApiError::InvalidPassword);
    }

    let hash = hash_password(new_password)?;
    let user = state
        .directory
        .consume_reset_code(&user.id, code, hash)
        .await
        .map_err(|e| match e {
            DirectoryError::NotFound => ApiError::UserNotFound,
            _ => ApiError::InvalidCode,
        })?;
    state.mirror.upsert(&user);
    info!(user_id = %user.id, "password reset");
    Ok(())
}
