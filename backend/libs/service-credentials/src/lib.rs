//! Service-to-service credentials (client side)
//!
//! Backend services call each other with short-lived service tokens obtained
//! through the client-credentials exchange. [`ServiceCredentialBroker`] mints
//! and caches them per audience, and [`ServiceRequestAuthorizer`] attaches
//! them to outgoing `reqwest` requests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use service_credentials::{
//!     ClientCredentialsConfig, HttpTokenEndpoint, ServiceCredentialBroker,
//!     ServiceRequestAuthorizer, ServiceTokenCache,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientCredentialsConfig::from_env()?;
//! let endpoint = HttpTokenEndpoint::new(config.token_url.clone(), config.timeout)?;
//! let broker = Arc::new(ServiceCredentialBroker::new(
//!     Arc::new(endpoint),
//!     (&config).into(),
//!     Arc::new(ServiceTokenCache::new()),
//!     Arc::new(jwt_security::SystemClock),
//! ));
//!
//! let ledger = ServiceRequestAuthorizer::new(broker, "ledger-service");
//! let request = ledger
//!     .authorize(reqwest::Client::new().get("http://ledger/entries"))
//!     .await?;
//! let response = request.send().await?;
//! ledger.observe(&response);
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod wire;

pub use broker::{ClientCredentials, ServiceCredentialBroker, REFRESH_BUFFER_SECS};
pub use cache::{CachedServiceToken, ServiceTokenCache};
pub use client::ServiceRequestAuthorizer;
pub use config::ClientCredentialsConfig;
pub use endpoint::{HttpTokenEndpoint, TokenEndpoint};
pub use wire::{
    ClientCredentialsRequest, TokenErrorResponse, TokenResponse, GRANT_TYPE_CLIENT_CREDENTIALS,
};
