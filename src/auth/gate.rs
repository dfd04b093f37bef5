//! Middleware guarding the private routes.
//!
//! The gate resolves the caller to a [`User`] and leaves it in the request
//! extensions as a [`CurrentUser`] for the handler. It is mounted with
//! `route_layer` on the private router only.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{
    auth::{extractors::CurrentUser, token::TokenService},
    error::{AppError, AuthError},
    state::AppState,
    users::{DirectoryError, User, UserDirectory},
};

/// Request (and sign-in response) header carrying the raw token.
pub const TOKEN_HEADER: &str = "token";

/// Verifies `raw_token` and loads the user it names.
///
/// A missing token is rejected before the directory is consulted.
pub async fn authenticate(
    tokens: &TokenService,
    users: &dyn UserDirectory,
    raw_token: Option<&str>,
) -> Result<User, AppError> {
    let claims = tokens.verify(raw_token).map_err(|e| {
        debug!(error = %e, "token rejected");
        AppError::from(e)
    })?;
    resolve_user(users, claims.user_id()).await
}

pub(crate) async fn resolve_user(users: &dyn UserDirectory, user_id: i64) -> Result<User, AppError> {
    match users.find_by_id(user_id).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::NotFound) => {
            warn!(user_id, "authenticated user no longer exists");
            Err(AuthError::UserResolutionFailed.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let raw_token = req
        .headers()
        .get(TOKEN_HEADER)
        .map(|v| v.to_str().map_err(|_| AuthError::MalformedToken))
        .transpose()?;
    let user = authenticate(&state.tokens, state.users.as_ref(), raw_token).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("session gate mounted without a session manager"))?;
    let user_id = sessions.read_session(req.headers()).await?;
    let user = resolve_user(state.users.as_ref(), user_id).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
