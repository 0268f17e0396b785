use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

pub const MIN_LEN: usize = 8;
pub const MAX_LEN: usize = 100;

lazy_static! {
    static ref UPPER: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref LOWER: Regex = Regex::new(r"[a-z]").unwrap();
    static ref DIGIT: Regex = Regex::new(r"[0-9]").unwrap();
    static ref SPACE: Regex = Regex::new(r"\s").unwrap();
}

/// Strength policy: 8..=100 chars, upper, lower, digit, no whitespace.
pub fn is_strong(password: &str) -> bool {
    let len = password.chars().count();
    (MIN_LEN..=MAX_LEN).contains(&len)
        && UPPER.is_match(password)
        && LOWER.is_match(password)
        && DIGIT.is_match(password)
        && !SPACE.is_match(password)
}

fn argon2_failure(stage: &'static str, e: argon2::password_hash::Error) -> anyhow::Error {
    error!(error = %e, stage, "argon2 failure");
    anyhow::anyhow!("argon2 {stage}: {e}")
}

/// PHC-format argon2id digest with a fresh OS-random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|e| argon2_failure("hash", e))
}

/// `Ok(false)` on a mismatch; `Err` only when `digest` is not a usable PHC string.
pub fn verify_password(plain: &str, digest: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(digest).map_err(|e| argon2_failure("parse", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon2_failure("verify", e)),
    }
}
