//! HTTP-facing errors for the auth service
//!
//! Token lifecycle failures keep their [`AuthError`] code. Account and
//! request failures get their own codes. Every error renders as
//! `{ "success": false, "error": { "code", "message" }, "timestamp" }`,
//! except on `/oauth/token` where [`OAuthError`] renders the RFC 6749 shape.

use actix_web::http::header::{HeaderValue, WWW_AUTHENTICATE};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use jwt_security::AuthError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User account is not active")]
    AccountNotActive,

    #[error("Please verify your email before logging in")]
    AccountPendingVerification,

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(err) => err.code(),
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            ApiError::AccountPendingVerification => "ACCOUNT_PENDING_VERIFICATION",
            ApiError::UnsupportedGrantType(_) => "UNSUPPORTED_GRANT_TYPE",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to clients
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.public_message(),
            // Don't leak internal details
            ApiError::Database(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => {
                StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::UNAUTHORIZED)
            }
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AccountNotActive | ApiError::AccountPendingVerification => {
                StatusCode::FORBIDDEN
            }
            ApiError::UnsupportedGrantType(_) | ApiError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut response = HttpResponse::build(status);
        if status == StatusCode::UNAUTHORIZED {
            response.insert_header((WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")));
        }

        response.json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Client-credentials failures in the `{ "error", "error_description" }` shape
#[derive(Debug, Error)]
#[error(transparent)]
pub struct OAuthError(#[from] pub ApiError);

impl From<AuthError> for OAuthError {
    fn from(err: AuthError) -> Self {
        Self(ApiError::Auth(err))
    }
}

impl ResponseError for OAuthError {
    fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.0.code(),
            "error_description": self.0.public_message(),
        }))
    }
}
