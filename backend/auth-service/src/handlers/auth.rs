//! Login, refresh and logout endpoints
//!
//! The refresh credential travels in an HttpOnly cookie and is never part of
//! a response body.

use crate::error::{ApiError, Result};
use crate::handlers::success;
use crate::models::{LoginRequest, LoginResponse, RefreshRequest};
use crate::AppState;
use actix_middleware::{bearer_token, Principal};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use jwt_security::AuthError;

pub const REFRESH_COOKIE: &str = "refresh";

fn refresh_cookie(value: String, ttl_secs: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(CookieDuration::seconds(ttl_secs))
        .finish()
}

fn cleared_refresh_cookie() -> Cookie<'static> {
    let mut cookie = refresh_cookie(String::new(), 0);
    cookie.make_removal();
    cookie
}

/// Cookie first, then the optional JSON body
fn presented_refresh_token(req: &HttpRequest, body: Option<web::Json<RefreshRequest>>) -> Option<String> {
    req.cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .filter(|t| !t.trim().is_empty())
}

fn session_response(state: &AppState, session: LoginResponse, message: &str) -> HttpResponse {
    let cookie = refresh_cookie(
        session.refresh_token.clone(),
        state.auth.refresh_tokens().ttl().num_seconds(),
    );
    HttpResponse::Ok()
        .cookie(cookie)
        .json(success(&session, Some(message)))
}

/// POST /auth/login
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    let session = state
        .auth
        .login(&request.account, &request.password, request.device_id.as_deref())
        .await?;

    Ok(session_response(&state, session, "Login successful"))
}

/// POST /auth/refresh
pub async fn refresh(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse> {
    let token = presented_refresh_token(&req, body).ok_or(AuthError::RefreshNotFound)?;
    let session = state.auth.refresh(&token).await?;

    Ok(session_response(&state, session, "Token refreshed"))
}

/// POST /auth/logout
///
/// Ends every session of the caller.
pub async fn logout(
    state: web::Data<AppState>,
    req: HttpRequest,
    principal: Principal,
) -> Result<HttpResponse> {
    let access_token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
    state.auth.logout(access_token, &principal.subject).await?;

    Ok(HttpResponse::Ok()
        .cookie(cleared_refresh_cookie())
        .json(success((), Some("Logged out"))))
}

/// POST /auth/logout-device
///
/// Ends the session bound to the presented refresh credential only.
pub async fn logout_device(
    state: web::Data<AppState>,
    req: HttpRequest,
    _principal: Principal,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse> {
    let access_token = bearer_token(req.headers())
        .ok_or(AuthError::MissingToken)?
        .to_string();
    let refresh_token = presented_refresh_token(&req, body)
        .ok_or_else(|| ApiError::InvalidRequest("refresh token is required".into()))?;

    state
        .auth
        .logout_device(&access_token, &refresh_token)
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(cleared_refresh_cookie())
        .json(success((), Some("Device logged out"))))
}
