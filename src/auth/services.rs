use tracing::{info, warn};

use crate::{
    auth::{
        dto::{present, SigninRequest, SignupRequest},
        jwt::JwtKeys,
        password::{hash_password, is_strong, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        directory::DirectoryError,
        model::{normalize_email, Role, User, UserPatch},
        services,
    },
};

fn role_for(state: &AppState, email: &str) -> Role {
    if email == state.config.admin_email {
        Role::Admin
    } else {
        Role::User
    }
}

pub async fn signup(state: &AppState, req: SignupRequest) -> Result<(String, User), ApiError> {
    let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
        present(&req.email),
        present(&req.password),
        present(&req.first_name),
        present(&req.last_name),
    ) else {
        return Err(ApiError::MissingFields);
    };
    let email = normalize_email(email);

    if !is_strong(password) {
        warn!("signup password rejected by policy");
        return Err(ApiError::InvalidPassword);
    }

    // Cheap pre-check so a duplicate signup does not pay for hashing. The
    // insert below re-checks under the lock.
    if services::find_by_email(state, &email).await.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::UserExists);
    }

    let hash = hash_password(password)?;
    let user = User::new(
        &email,
        hash,
        first_name.trim().to_string(),
        last_name.trim().to_string(),
        role_for(state, &email),
        state.clock.now(),
    );

    let user = state.directory.insert(user).await.map_err(|e| match e {
        DirectoryError::Conflict => ApiError::UserExists,
        other => ApiError::from(other),
    })?;
    state.mirror.upsert(&user);

    let token = JwtKeys::from(&state.config.jwt).sign(&user.id)?;
    info!(user_id = %user.id, role = user.role.as_str(), "user signed up");
    Ok((token, user))
}

pub async fn signin(state: &AppState, req: SigninRequest) -> Result<(String, User), ApiError> {
    let (Some(email), Some(password)) = (present(&req.email), present(&req.password)) else {
        return Err(ApiError::MissingFields);
    };
    let email = normalize_email(email);

    let Some(user) = services::find_by_email(state, &email).await else {
        warn!(email = %email, "signin unknown email");
        return Err(ApiError::InvalidUser);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(ApiError::InvalidUser);
    }

    let user = state
        .directory
        .update(
            &user.id,
            UserPatch {
                last_login_at: Some(state.clock.now()),
                ..Default::default()
            },
        )
        .await
        .map_err(|_| ApiError::InvalidUser)?;
    state.mirror.upsert(&user);

    let token = JwtKeys::from(&state.config.jwt).sign(&user.id)?;
    info!(user_id = %user.id, "user signed in");
    Ok((token, user))
}

/// Create the administrator account on startup when a password is
/// configured and the account does not exist yet.
pub async fn seed_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(password) = state.config.admin_password.as_deref() else {
        return Ok(());
    };
    let email = state.config.admin_email.clone();

    if let Some(existing) = services::find_by_email(state, &email).await {
        if !existing.is_admin() {
            warn!(user_id = %existing.id, "configured admin email belongs to a regular user");
        }
        return Ok(());
    }

    if !is_strong(password) {
        warn!("ADMIN_PASSWORD does not satisfy the password policy; using it anyway");
    }
    let admin = User::new(
        &email,
        hash_password(password)?,
        "Admin".into(),
        "Admin".into(),
        Role::Admin,
        state.clock.now(),
    );
    let admin = state
        .directory
        .insert(admin)
        .await
        .map_err(|e| anyhow::anyhow!("seed admin: {e}"))?;
    state.mirror.upsert(&admin);
    info!(user_id = %admin.id, email = %admin.email, "admin account created");
    Ok(())
}
