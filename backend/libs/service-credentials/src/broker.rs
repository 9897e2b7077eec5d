//! Service credential broker
//!
//! Hands out bearer tokens for calls to other backend services, minting them
//! through the client-credentials exchange and caching one per audience. A
//! cached token is reused only while more than [`REFRESH_BUFFER_SECS`] of its
//! lifetime is left.
//!
//! Concurrent misses for the same audience are not coalesced; each may mint.

use crate::cache::{CachedServiceToken, ServiceTokenCache};
use crate::config::ClientCredentialsConfig;
use crate::endpoint::TokenEndpoint;
use crate::wire::ClientCredentialsRequest;
use chrono::Duration;
use jwt_security::{AuthError, Result, SharedClock};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REFRESH_BUFFER_SECS: i64 = 30;

/// This process's own client credentials
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl From<&ClientCredentialsConfig> for ClientCredentials {
    fn from(config: &ClientCredentialsConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
        }
    }
}

pub struct ServiceCredentialBroker {
    endpoint: Arc<dyn TokenEndpoint>,
    credentials: ClientCredentials,
    cache: Arc<ServiceTokenCache>,
    clock: SharedClock,
    refresh_buffer: Duration,
}

impl ServiceCredentialBroker {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        credentials: ClientCredentials,
        cache: Arc<ServiceTokenCache>,
        clock: SharedClock,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            cache,
            clock,
            refresh_buffer: Duration::seconds(REFRESH_BUFFER_SECS),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    pub fn cache(&self) -> &Arc<ServiceTokenCache> {
        &self.cache
    }

    /// Bearer token for calls to `audience`
    pub async fn get_service_token(&self, audience: &str) -> Result<String> {
        let now = self.clock.now();
        if let Some(token) = self.cache.fresh(audience, now, self.refresh_buffer) {
            debug!(audience = %audience, "Using cached service token");
            return Ok(token);
        }

        let request = ClientCredentialsRequest::new(
            self.credentials.client_id.clone(),
            self.credentials.client_secret.clone(),
            self.credentials.scope.clone(),
            Some(audience.to_string()),
        );

        let response = self
            .endpoint
            .request_token(&request)
            .await
            .map_err(|e| match e {
                AuthError::ServiceTokenUnavailable(_) => e,
                other => AuthError::ServiceTokenUnavailable(other.to_string()),
            })?;

        if response.expires_in <= 0 {
            return Err(AuthError::ServiceTokenUnavailable(format!(
                "token endpoint returned non-positive expires_in {}",
                response.expires_in
            )));
        }

        let captured_at = self.clock.now();
        let Some((lifetime, expires_at)) = Duration::try_seconds(response.expires_in)
            .and_then(|lifetime| Some((lifetime, captured_at.checked_add_signed(lifetime)?)))
        else {
            return Err(AuthError::ServiceTokenUnavailable(format!(
                "token endpoint returned out-of-range expires_in {}",
                response.expires_in
            )));
        };
        if lifetime <= self.refresh_buffer {
            warn!(
                audience = %audience,
                expires_in = response.expires_in,
                "Service token lifetime is within the refresh buffer and will not be reused"
            );
        }

        self.cache.put(
            audience,
            CachedServiceToken {
                token: response.access_token.clone(),
                cached_at: captured_at,
                expires_at,
            },
        );

        info!(
            client_id = %self.credentials.client_id,
            audience = %audience,
            expires_in = response.expires_in,
            "Minted service token"
        );
        Ok(response.access_token)
    }

    /// Drop the cached token for `audience` so the next call mints a new one
    pub fn clear_cache(&self, audience: &str) {
        if self.cache.remove(audience) {
            info!(audience = %audience, "Cleared cached service token");
        }
    }
}
