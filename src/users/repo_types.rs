use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,                    // assigned by the directory
    pub email: String,              // unique, lower-cased
    #[serde(skip_serializing)]
    pub encrypted_password: String, // argon2 PHC string, not exposed in JSON
    pub created_at: OffsetDateTime,
}

impl User {
    /// Strips everything a client must never see.
    pub fn sanitize(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

/// A validated, hashed user that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub encrypted_password: String,
}

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 100;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Checks sign-up input, returning the message to show the caller.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("email: cannot be blank".into());
    }
    if !is_valid_email(email) {
        return Err("email: must be a valid email address".into());
    }
    if password.is_empty() {
        return Err("password: cannot be blank".into());
    }
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(format!(
            "password: the length must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN}"
        ));
    }
    Ok(())
}
