//! Error kinds shared by every component of the token lifecycle
//!
//! Callers branch on the variant, so verification failures are never
//! collapsed into a generic "auth failed".

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedTokenAlgorithm(String),

    #[error("Token issuer mismatch")]
    InvalidIssuer,

    #[error("Missing authentication token")]
    MissingToken,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Refresh token not found")]
    RefreshNotFound,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Invalid refresh token format")]
    RefreshFormatInvalid,

    #[error("Unknown service client")]
    UnknownClient,

    #[error("Service client is disabled")]
    ClientDisabled,

    #[error("Invalid client credentials")]
    InvalidSecret,

    #[error("Requested scope is not allowed for this client: {0}")]
    ScopeNotAllowed(String),

    #[error("Service token unavailable: {0}")]
    ServiceTokenUnavailable(String),

    #[error("No signing key configured")]
    NoSigningKeyConfigured,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code for response bodies and logs
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "MALFORMED_TOKEN",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::UnsupportedTokenAlgorithm(_) => "UNSUPPORTED_TOKEN_ALGORITHM",
            AuthError::InvalidIssuer => "INVALID_ISSUER",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::RefreshNotFound => "REFRESH_NOT_FOUND",
            AuthError::RefreshExpired => "REFRESH_EXPIRED",
            AuthError::RefreshFormatInvalid => "REFRESH_FORMAT_INVALID",
            AuthError::UnknownClient => "UNKNOWN_CLIENT",
            AuthError::ClientDisabled => "CLIENT_DISABLED",
            AuthError::InvalidSecret => "INVALID_SECRET",
            AuthError::ScopeNotAllowed(_) => "SCOPE_NOT_ALLOWED",
            AuthError::ServiceTokenUnavailable(_) => "SERVICE_TOKEN_UNAVAILABLE",
            AuthError::NoSigningKeyConfigured => "NO_SIGNING_KEY_CONFIGURED",
            AuthError::InvalidKey(_) => "INVALID_KEY",
            AuthError::Storage(_) => "STORAGE_UNAVAILABLE",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status class used wherever these errors cross a service boundary
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::MalformedToken(_)
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::UnsupportedTokenAlgorithm(_)
            | AuthError::InvalidIssuer
            | AuthError::MissingToken
            | AuthError::TokenRevoked
            | AuthError::RefreshNotFound
            | AuthError::RefreshExpired
            | AuthError::RefreshFormatInvalid
            | AuthError::UnknownClient
            | AuthError::InvalidSecret => 401,
            AuthError::ClientDisabled | AuthError::ScopeNotAllowed(_) => 403,
            AuthError::ServiceTokenUnavailable(_) | AuthError::Storage(_) => 503,
            AuthError::NoSigningKeyConfigured
            | AuthError::InvalidKey(_)
            | AuthError::Internal(_) => 500,
        }
    }

    /// Message safe to return to a caller.
    ///
    /// Server-side failures are reduced to a generic text so infrastructure
    /// details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.http_status() {
            500 => "Internal server error".to_string(),
            503 => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        AuthError::Storage(err.to_string())
    }
}
