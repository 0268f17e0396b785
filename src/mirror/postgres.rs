use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

use super::UserMirror;
use crate::users::model::{ResetCode, User};

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    last_login_at: OffsetDateTime,
    created_at: OffsetDateTime,
    captured: Vec<i32>,
    reset_code: Option<String>,
    reset_code_expires_at: Option<OffsetDateTime>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let reset = match (r.reset_code, r.reset_code_expires_at) {
            (Some(code), Some(expires_at)) => Some(ResetCode { code, expires_at }),
            _ => None,
        };
        Ok(User {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            role: r.role.parse()?,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            captured: r
                .captured
                .into_iter()
                .filter_map(|id| u32::try_from(id).ok())
                .collect(),
            reset,
        })
    }
}

const SELECT_USER: &str = r#"
    SELECT id, email, password_hash, first_name, last_name, role,
           last_login_at, created_at, captured, reset_code, reset_code_expires_at
    FROM users
"#;

#[derive(Clone)]
pub struct PgMirror {
    db: PgPool,
}

impl PgMirror {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl UserMirror for PgMirror {
    async fn upsert(&self, user: &User) -> anyhow::Result<()> {
        let captured: Vec<i32> = user
            .captured
            .iter()
            .filter_map(|id| i32::try_from(*id).ok())
            .collect();
        let (reset_code, reset_expires) = match &user.reset {
            Some(r) => (Some(r.code.as_str()), Some(r.expires_at)),
            None => (None, None),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role,
                               last_login_at, created_at, captured, reset_code, reset_code_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                role = EXCLUDED.role,
                last_login_at = EXCLUDED.last_login_at,
                captured = EXCLUDED.captured,
                reset_code = EXCLUDED.reset_code,
                reset_code_expires_at = EXCLUDED.reset_code_expires_at,
                updated_at = now()
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(captured)
        .bind(reset_code)
        .bind(reset_expires)
        .execute(&self.db)
        .await
        .with_context(|| format!("upsert user {}", user.id))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete user {id}"))?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
