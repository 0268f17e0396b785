use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Unset means the mirror is disabled.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub reset_code_ttl_minutes: i64,
    /// Unset means reset codes are only written to the log.
    pub mail: Option<MailConfig>,
    pub catalog_path: Option<String>,
    pub listen_addr: SocketAddr,
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pokedex".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "pokedex-app".into()),
            ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(180),
        };
        let mail = optional("MAIL_FROM").map(|from| MailConfig {
            from,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint: optional("SES_ENDPOINT"),
            access_key: optional("AWS_ACCESS_KEY_ID"),
            secret_key: optional("AWS_SECRET_ACCESS_KEY"),
        });
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into());
        let listen_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("APP_HOST/APP_PORT do not form an address: {host}:{port}"))?;
        Ok(Self {
            database_url: optional("DATABASE_URL"),
            jwt,
            admin_email: crate::users::model::normalize_email(
                &std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@admin".into()),
            ),
            admin_password: optional("ADMIN_PASSWORD"),
            reset_code_ttl_minutes: std::env::var("RESET_CODE_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
            mail,
            catalog_path: optional("POKEMON_CATALOG_PATH"),
            listen_addr,
        })
    }
}
