use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{config::AuthMode, state::AppState};

pub mod dto;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod password;
pub mod services;
pub mod session;
pub mod token;

/// Public sign-up/sign-in routes plus `/private/*` behind the gate that
/// matches the deployment's auth mode.
pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/sign-up", post(handlers::sign_up));
    let private = Router::new().route("/whoami", get(handlers::whoami));

    let (public, private) = match state.config.auth_mode {
        AuthMode::Token => (
            public.route("/sign-in", post(handlers::sign_in_token)),
            private.route_layer(middleware::from_fn_with_state(
                state.clone(),
                gate::require_token,
            )),
        ),
        AuthMode::Session => (
            public.route("/sign-in", post(handlers::sign_in_session)),
            private.route_layer(middleware::from_fn_with_state(
                state.clone(),
                gate::require_session,
            )),
        ),
    };

    public.nest("/private", private)
}
