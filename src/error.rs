//! HTTP-facing error type.
//!
//! Every failure that reaches a handler boundary is turned into an
//! [`AppError`], which renders as `{"error": "<message>"}` with the
//! matching status code. Internal failures are logged and replaced by a
//! generic message before they leave the process.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::{password::PasswordError, session::SessionError, token::TokenError};
use crate::users::repo::DirectoryError;

/// Reasons a caller is refused an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token header not found")]
    MissingToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user could not be resolved")]
    UserResolutionFailed,
    #[error("no active session")]
    NoSession,
    #[error("invalid session")]
    InvalidSessionValue,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed JSON, missing fields or other unusable input.
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed input the caller has to correct.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(e) => e.status_code(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "internal error");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Missing => AuthError::MissingToken.into(),
            TokenError::Malformed => AuthError::MalformedToken.into(),
            TokenError::InvalidSignature => AuthError::InvalidSignature.into(),
            TokenError::Expired => AuthError::TokenExpired.into(),
            TokenError::MalformedClaims(_) | TokenError::Signing(_) => {
                AppError::Internal(anyhow::Error::new(e))
            }
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::InvalidInput => AppError::Validation(e.to_string()),
            PasswordError::MalformedHash(_) | PasswordError::Hashing(_) => {
                AppError::Internal(anyhow::Error::new(e))
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NoSession => AuthError::NoSession.into(),
            SessionError::InvalidSessionValue => AuthError::InvalidSessionValue.into(),
            SessionError::Persist(_) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DuplicateEmail => AppError::Validation(e.to_string()),
            DirectoryError::NotFound => AuthError::UserResolutionFailed.into(),
            DirectoryError::Storage(_) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}
