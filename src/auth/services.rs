use tracing::warn;

use crate::{
    auth::password::{hash_password, verify_password},
    error::{AppError, AuthError},
    users::{
        repo_types::{normalize_email, validate_credentials},
        DirectoryError, NewUser, User, UserDirectory,
    },
};

/// Validates and hashes sign-up input, then stores the user.
pub async fn register(
    users: &dyn UserDirectory,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    validate_credentials(&email, password).map_err(|msg| {
        warn!(email = %email, reason = %msg, "sign-up rejected");
        AppError::Validation(msg)
    })?;

    let encrypted_password = hash_password(password)?;
    let user = users
        .create(NewUser {
            email,
            encrypted_password,
        })
        .await
        .map_err(|e| {
            if matches!(e, DirectoryError::DuplicateEmail) {
                warn!("email already registered");
            }
            AppError::from(e)
        })?;
    Ok(user)
}

/// Looks the user up by email and checks the password.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn check_credentials(
    users: &dyn UserDirectory,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let user = match users.find_by_email(&email).await {
        Ok(u) => u,
        Err(DirectoryError::NotFound) => {
            warn!(email = %email, "sign-in unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password(password, &user.encrypted_password)? {
        warn!(user_id = user.id, "sign-in invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(user)
}
