//! Auth service
//!
//! Issues user sessions (access token plus rotating refresh credential),
//! revokes them on logout and mints service tokens through the
//! client-credentials grant.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

pub use error::{ApiError, OAuthError, Result};

use jwt_security::{TokenBlacklist, TokenCodec};
use services::{AuthService, ClientCredentialsIssuer};
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub client_credentials: Arc<ClientCredentialsIssuer>,
    pub codec: Arc<TokenCodec>,
    pub blacklist: Arc<TokenBlacklist>,
}
