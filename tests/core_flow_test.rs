//! Core Flow Integration Tests
//!
//! Purpose: Verify a user session end to end through the edge gate
//! Dependencies: none (in-memory account directory and TTL store)
//!
//! Test Coverage:
//! 1. Login, protected call, logout, rejected reuse
//! 2. Public-read paths open to GET only
//! 3. Refresh credential rotation behind the gate
//!
//! Run: cargo test --test core_flow_test

use actix_middleware::{EdgeAuthGate, PathPolicy, X_ACCOUNT_ID};
use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, HttpRequest, HttpResponse};
use auth_service::db::{InMemoryAccountDirectory, InMemoryServiceClientRepository};
use auth_service::handlers::REFRESH_COOKIE;
use auth_service::models::{Account, AccountStatus};
use auth_service::security::hash_password;
use auth_service::services::{AuthService, ClientCredentialsIssuer, RefreshTokenStore};
use auth_service::{routes, AppState};
use jwt_security::test_utils::rsa_issuer;
use jwt_security::{MemoryTtlStore, Roles, SharedClock, TokenBlacklist};
use serde_json::{json, Value};
use std::sync::Arc;

const PASSWORD: &str = "Wonderland1!";

fn state() -> web::Data<AppState> {
    let (issuer, codec, clock) = rsa_issuer();
    let clock: SharedClock = clock;
    let store = Arc::new(MemoryTtlStore::new(clock.clone()));
    let blacklist = Arc::new(TokenBlacklist::new(store.clone(), codec.clone()));
    let refresh = Arc::new(RefreshTokenStore::new(store, clock, 7 * 24 * 3600).unwrap());

    let accounts = Arc::new(InMemoryAccountDirectory::new());
    accounts.insert(Account {
        id: "alice-id".into(),
        username: "alice".into(),
        email: "alice@example.com".into(),
        password_hash: hash_password(PASSWORD).unwrap(),
        status: AccountStatus::Active,
        roles: Roles::new(["USER"]),
    });

    web::Data::new(AppState {
        auth: Arc::new(AuthService::new(
            accounts,
            issuer.clone(),
            refresh,
            blacklist.clone(),
        )),
        client_credentials: Arc::new(ClientCredentialsIssuer::new(
            Arc::new(InMemoryServiceClientRepository::new()),
            issuer,
        )),
        codec,
        blacklist,
    })
}

async fn me(req: HttpRequest) -> HttpResponse {
    let id = req
        .headers()
        .get(X_ACCOUNT_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    HttpResponse::Ok().json(json!({ "account_id": id }))
}

async fn courses() -> HttpResponse {
    HttpResponse::Ok().json(json!([]))
}

macro_rules! edge_app {
    ($state:expr) => {{
        let state = $state.clone();
        let policy = PathPolicy::new(["/auth/login", "/auth/refresh", "/health"], ["/api/courses"]);
        test::init_service(
            App::new()
                .wrap(EdgeAuthGate::new(
                    state.codec.clone(),
                    state.blacklist.clone(),
                    policy,
                ))
                .app_data(state.clone())
                .route("/api/me", web::get().to(me))
                .route("/api/courses", web::get().to(courses))
                .route("/api/courses", web::post().to(courses))
                .configure(move |cfg| routes::configure(cfg, &state)),
        )
        .await
    }};
}

fn login_body() -> Value {
    json!({ "account": "alice", "password": PASSWORD })
}

#[actix_web::test]
async fn test_login_logout_revokes_session() {
    let state = state();
    let app = edge_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(login_body())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let bearer = format!("Bearer {access}");
    let jti = state.codec.verify(&access).unwrap().jti;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/me")
            .insert_header((header::AUTHORIZATION, bearer.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["account_id"], "alice-id");
    assert!(!state.blacklist.is_revoked(&jti).await);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/logout")
            .insert_header((header::AUTHORIZATION, bearer.clone()))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(state.blacklist.is_revoked(&jti).await);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/me")
            .insert_header((header::AUTHORIZATION, bearer))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "TOKEN_REVOKED");
}

#[actix_web::test]
async fn test_public_read_path_is_get_only() {
    let state = state();
    let app = edge_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/courses").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/courses").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");
}

#[actix_web::test]
async fn test_refresh_rotation_behind_gate() {
    let state = state();
    let app = edge_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/login")
            .set_json(login_body())
            .to_request(),
    )
    .await;
    let first: Cookie<'static> = resp
        .response()
        .cookies()
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.into_owned())
        .unwrap();

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/refresh")
            .cookie(first.clone())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second = resp
        .response()
        .cookies()
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.into_owned())
        .unwrap();
    assert_ne!(first.value(), second.value());

    let body: Value = test::read_body_json(resp).await;
    let access = body["data"]["access_token"].as_str().unwrap();
    assert!(state.codec.verify(access).is_ok());
    assert!(body["data"].get("user").is_none());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/refresh")
            .cookie(first)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
