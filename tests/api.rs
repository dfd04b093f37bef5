use std::sync::Arc;

use async_trait::async_trait;
use authgate::{
    app::build_app,
    auth::session::{MemorySessionStore, Session, SessionStore},
    config::{AppConfig, AuthMode, JwtConfig, SessionBackend, SessionConfig},
    state::AppState,
    users::{DirectoryError, MemoryUserDirectory, NewUser, User, UserDirectory},
};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

fn test_config(auth_mode: AuthMode) -> AppConfig {
    AppConfig {
        database_url: String::new(),
        db_max_connections: 1,
        auth_mode,
        jwt: JwtConfig {
            secret: "integration-secret".into(),
        },
        session: SessionConfig {
            backend: SessionBackend::Memory,
            ..SessionConfig::default()
        },
        request_timeout_secs: 5,
    }
}

fn setup(auth_mode: AuthMode) -> (Router, AppState) {
    let state = AppState::in_memory(test_config(auth_mode));
    (build_app(state.clone()), state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let res = app.clone().oneshot(req).await.expect("request");
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, headers, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn whoami(extra: Option<(&str, &str)>) -> Request<Body> {
    let mut req = Request::get("/private/whoami");
    if let Some((name, value)) = extra {
        req = req.header(name, value);
    }
    req.body(Body::empty()).unwrap()
}

fn credentials() -> Value {
    json!({ "email": "a@b.com", "password": "secret123" })
}

#[tokio::test]
async fn token_flow_end_to_end() {
    let (app, state) = setup(AuthMode::Token);

    let (status, _, body) = send(&app, post_json("/sign-up", credentials())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@b.com");
    assert!(body.get("password").is_none());
    assert!(body.get("encrypted_password").is_none());
    let user_id = body["id"].as_i64().expect("numeric id");

    let (status, headers, body) = send(&app, post_json("/sign-in", credentials())).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token in body").to_string();
    assert!(!token.is_empty());
    assert_eq!(headers.get("token").unwrap().to_str().unwrap(), token);

    let (status, _, body) = send(&app, whoami(Some(("Token", &token)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": user_id, "email": "a@b.com" }));

    let (status, _, body) = send(&app, whoami(None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "token header not found");

    let expired = state
        .tokens
        .mint_at(user_id, OffsetDateTime::now_utc() - Duration::hours(25))
        .unwrap();
    let (status, _, body) = send(&app, whoami(Some(("Token", &expired)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token expired");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let (app, _) = setup(AuthMode::Token);
    let (status, _, body) = send(&app, whoami(Some(("Token", "not.a.jwt")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "malformed token");
}

#[tokio::test]
async fn token_for_deleted_or_unknown_user_is_rejected() {
    let (app, state) = setup(AuthMode::Token);
    let token = state.tokens.mint(12345).unwrap();
    let (status, _, body) = send(&app, whoami(Some(("Token", &token)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "user could not be resolved");
}

#[tokio::test]
async fn sign_up_validation() {
    let (app, _) = setup(AuthMode::Token);

    let (status, _, _) = send(&app, post_json("/sign-up", credentials())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(&app, post_json("/sign-up", credentials())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "email has already been taken");

    let (status, _, body) = send(
        &app,
        post_json("/sign-up", json!({ "email": "invalid", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("email"));

    let (status, _, _) = send(
        &app,
        post_json("/sign-up", json!({ "email": "c@d.com", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (app, _) = setup(AuthMode::Token);

    let req = Request::post("/sign-up")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _, body) = send(&app, post_json("/sign-in", json!({ "email": "a@b.com" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (app, _) = setup(AuthMode::Token);
    send(&app, post_json("/sign-up", credentials())).await;

    let (status, headers, body) = send(
        &app,
        post_json("/sign-in", json!({ "email": "a@b.com", "password": "wrong-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid email or password");
    assert!(headers.get("token").is_none());
}

#[tokio::test]
async fn session_flow_end_to_end() {
    let (app, _) = setup(AuthMode::Session);

    let (status, _, body) = send(&app, post_json("/sign-up", credentials())).await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = body["id"].as_i64().unwrap();

    let (status, headers, body) = send(&app, post_json("/sign-in", credentials())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id);
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("authgate_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let pair = set_cookie.split(';').next().unwrap();

    let (status, _, body) = send(&app, whoami(Some(("Cookie", pair)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": user_id, "email": "a@b.com" }));

    let (status, _, body) = send(&app, whoami(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "no active session");

    let (status, _, _) = send(&app, whoami(Some(("Cookie", "authgate_session=forged")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_mode_ignores_tokens() {
    let (app, state) = setup(AuthMode::Session);
    send(&app, post_json("/sign-up", credentials())).await;
    let token = state.tokens.mint(1).unwrap();

    let (status, _, _) = send(&app, whoami(Some(("Token", &token)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (app, _) = setup(AuthMode::Token);
    let (status, headers, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));

    let req = Request::get("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, req).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "abc-123");
}

struct StalledDirectory;

#[async_trait]
impl UserDirectory for StalledDirectory {
    async fn create(&self, _user: NewUser) -> Result<User, DirectoryError> {
        std::future::pending().await
    }
    async fn find_by_email(&self, _email: &str) -> Result<User, DirectoryError> {
        std::future::pending().await
    }
    async fn find_by_id(&self, _id: i64) -> Result<User, DirectoryError> {
        std::future::pending().await
    }
}

struct UnreachableSessionStore;

#[async_trait]
impl SessionStore for UnreachableSessionStore {
    async fn load(&self, _id: &str) -> anyhow::Result<Option<Session>> {
        anyhow::bail!("connection refused")
    }
    async fn save(&self, _session: &Session) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn stalled_directory_times_out_as_internal_error() {
    let config = AppConfig {
        request_timeout_secs: 1,
        ..test_config(AuthMode::Token)
    };
    let state = AppState::from_parts(
        config,
        Arc::new(StalledDirectory),
        Arc::new(MemorySessionStore::new()),
    );
    let app = build_app(state.clone());
    let token = state.tokens.mint(1).unwrap();

    let (status, headers, body) = send(&app, whoami(Some(("Token", &token)))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn session_sign_in_with_wrong_password_sets_no_cookie() {
    let (app, _) = setup(AuthMode::Session);
    send(&app, post_json("/sign-up", credentials())).await;

    let (status, headers, body) = send(
        &app,
        post_json("/sign-in", json!({ "email": "a@b.com", "password": "wrong-one" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid email or password");
    assert!(headers.get(header::SET_COOKIE).is_none());

    let (status, _, _) = send(
        &app,
        post_json("/sign-in", json!({ "email": "nobody@b.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unreachable_session_store_is_internal_error() {
    let state = AppState::from_parts(
        test_config(AuthMode::Session),
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(UnreachableSessionStore),
    );
    let app = build_app(state);

    let (status, _, _) = send(&app, post_json("/sign-up", credentials())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, headers, body) = send(&app, post_json("/sign-in", credentials())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
    assert!(headers.get(header::SET_COOKIE).is_none());

    let (status, _, body) = send(&app, whoami(Some(("Cookie", "authgate_session=abc")))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");
}
