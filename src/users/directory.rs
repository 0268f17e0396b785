use std::collections::{BTreeSet, HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use super::model::{normalize_email, User, UserPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("email already registered")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("operation not allowed on this account")]
    Forbidden,
    #[error("reset code does not match")]
    CodeMismatch,
}

#[derive(Default)]
struct Records {
    by_id: HashMap<String, User>,
    /// normalized email -> id
    by_email: HashMap<String, String>,
    /// Ids removed by `delete`. The mirror may still hold them.
    deleted: HashSet<String>,
}

/// Authoritative in-memory user set. Every mutation happens under one write
/// lock so the email index can never disagree with the records.
#[derive(Default)]
pub struct UserDirectory {
    inner: RwLock<Records>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        let records = self.inner.read().await;
        records
            .by_email
            .get(&email)
            .and_then(|id| records.by_id.get(id))
            .cloned()
    }

    pub async fn find_by_id(&self, id: &str) -> Option<User> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn insert(&self, mut user: User) -> Result<User, DirectoryError> {
        user.email = normalize_email(&user.email);
        let mut records = self.inner.write().await;
        if records.by_email.contains_key(&user.email) || records.by_id.contains_key(&user.id) {
            return Err(DirectoryError::Conflict);
        }
        records.by_email.insert(user.email.clone(), user.id.clone());
        records.by_id.insert(user.id.clone(), user.clone());
        debug!(user_id = %user.id, "directory insert");
        Ok(user)
    }

    /// Insert a record loaded from the mirror. If a record with the same id
    /// or email got in first, that one wins and is returned. Records deleted
    /// here are never brought back.
    pub async fn cache(&self, user: User) -> Option<User> {
        let mut records = self.inner.write().await;
        if records.deleted.contains(&user.id) {
            debug!(user_id = %user.id, "mirror record of deleted user ignored");
            return None;
        }
        if let Some(existing) = records.by_id.get(&user.id) {
            return Some(existing.clone());
        }
        if let Some(existing) = records
            .by_email
            .get(&user.email)
            .and_then(|id| records.by_id.get(id))
        {
            return Some(existing.clone());
        }
        records.by_email.insert(user.email.clone(), user.id.clone());
        records.by_id.insert(user.id.clone(), user.clone());
        debug!(user_id = %user.id, "directory cached mirror record");
        Some(user)
    }

    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<User, DirectoryError> {
        let mut records = self.inner.write().await;
        let Records { by_id, by_email, .. } = &mut *records;
        let user = by_id.get_mut(id).ok_or(DirectoryError::NotFound)?;

        if let Some(email) = patch.email {
            let email = normalize_email(&email);
            if email != user.email {
                if by_email.get(&email).is_some_and(|owner| owner != id) {
                    return Err(DirectoryError::Conflict);
                }
                by_email.remove(&user.email);
                by_email.insert(email.clone(), id.to_string());
                user.email = email;
            }
        }
        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(at) = patch.last_login_at {
            user.last_login_at = at;
        }
        if let Some(reset) = patch.reset {
            user.reset = reset;
        }
        Ok(user.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<User, DirectoryError> {
        let mut records = self.inner.write().await;
        let user = records.by_id.get(id).ok_or(DirectoryError::NotFound)?;
        if user.is_admin() {
            return Err(DirectoryError::Forbidden);
        }
        let email = user.email.clone();
        records.by_email.remove(&email);
        records.deleted.insert(id.to_string());
        records.by_id.remove(id).ok_or(DirectoryError::NotFound)
    }

    /// All users, oldest first.
    pub async fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.inner.read().await.by_id.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        users
    }

    /// Add or remove one Pokémon id. Both directions are idempotent.
    pub async fn set_capture(
        &self,
        id: &str,
        pokemon_id: u32,
        capture: bool,
    ) -> Result<(User, BTreeSet<u32>), DirectoryError> {
        let mut records = self.inner.write().await;
        let user = records.by_id.get_mut(id).ok_or(DirectoryError::NotFound)?;
        if capture {
            user.captured.insert(pokemon_id);
        } else {
            user.captured.remove(&pokemon_id);
        }
        Ok((user.clone(), user.captured.clone()))
    }

    /// Replace the password and clear the reset code, but only if `code` is
    /// still the outstanding one.
    pub async fn consume_reset_code(
        &self,
        id: &str,
        code: &str,
        password_hash: String,
    ) -> Result<User, DirectoryError> {
        let mut records = self.inner.write().await;
        let user = records.by_id.get_mut(id).ok_or(DirectoryError::NotFound)?;
        match &user.reset {
            Some(reset) if reset.code == code => {
                user.password_hash = password_hash;
                user.reset = None;
                Ok(user.clone())
            }
            _ => Err(DirectoryError::CodeMismatch),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }
}
