//! Business logic services

pub mod auth_service;
pub mod client_credentials;
pub mod refresh_tokens;

pub use auth_service::AuthService;
pub use client_credentials::{provision_clients, ClientCredentialsIssuer};
pub use refresh_tokens::{IssuedRefreshToken, RefreshRecord, RefreshTokenStore};
