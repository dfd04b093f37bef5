use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{CredentialsRequest, TokenResponse},
        extractors::{ApiJson, CurrentUser},
        gate::TOKEN_HEADER,
        services::{check_credentials, register},
        token::TokenService,
    },
    error::AppError,
    state::AppState,
    users::PublicUser,
};

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = register(state.users.as_ref(), &payload.email, &payload.password).await?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.sanitize())))
}

/// Token deployment: the token goes back in the `Token` header and the body.
#[instrument(skip(state, tokens, payload))]
pub async fn sign_in_token(
    State(state): State<AppState>,
    State(tokens): State<TokenService>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = check_credentials(state.users.as_ref(), &payload.email, &payload.password).await?;
    let token = tokens.mint(user.id)?;

    info!(user_id = user.id, "user signed in");
    Ok(([(TOKEN_HEADER, token.clone())], Json(TokenResponse { token })))
}

/// Session deployment: the session cookie is set on the response.
#[instrument(skip(state, headers, payload))]
pub async fn sign_in_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state
        .sessions
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("session sign-in without a session manager"))?;
    let user = check_credentials(state.users.as_ref(), &payload.email, &payload.password).await?;
    let cookie = sessions.create_session(&headers, user.id).await?;

    info!(user_id = user.id, "user signed in");
    Ok(([(SET_COOKIE, cookie.to_string())], Json(user.sanitize())))
}

pub async fn whoami(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.sanitize())
}
