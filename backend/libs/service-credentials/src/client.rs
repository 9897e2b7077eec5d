//! Outbound request authorization for service-to-service calls

use crate::broker::ServiceCredentialBroker;
use jwt_security::Result;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tracing::warn;

/// Attaches a service token for one downstream audience to outgoing requests
#[derive(Clone)]
pub struct ServiceRequestAuthorizer {
    broker: Arc<ServiceCredentialBroker>,
    audience: String,
}

impl ServiceRequestAuthorizer {
    pub fn new(broker: Arc<ServiceCredentialBroker>, audience: impl Into<String>) -> Self {
        Self {
            broker,
            audience: audience.into(),
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Adds `Authorization: Bearer <token>`. Fails rather than sending the
    /// request unauthenticated.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.broker.get_service_token(&self.audience).await?;
        Ok(request.header(AUTHORIZATION, format!("Bearer {token}")))
    }

    /// Call when the downstream service rejected the token
    pub fn on_unauthorized(&self) {
        warn!(audience = %self.audience, "Downstream rejected service token, clearing cache");
        self.broker.clear_cache(&self.audience);
    }

    /// Clears the cached token if `response` is a 401
    pub fn observe(&self, response: &Response) {
        if response.status() == StatusCode::UNAUTHORIZED {
            self.on_unauthorized();
        }
    }
}
