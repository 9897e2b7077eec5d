use crate::wire::{ClientCredentialsRequest, TokenErrorResponse, TokenResponse, BEARER};
use async_trait::async_trait;
use jwt_security::{AuthError, Result};
use std::time::Duration;
use tracing::warn;

/// Where service tokens are minted
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Any failure surfaces as [`AuthError::ServiceTokenUnavailable`]
    async fn request_token(&self, request: &ClientCredentialsRequest) -> Result<TokenResponse>;
}

/// Token endpoint reached over HTTP with a form post
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn unavailable(reason: impl Into<String>) -> AuthError {
    let reason = reason.into();
    warn!(reason = %reason, "Service token request failed");
    AuthError::ServiceTokenUnavailable(reason)
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_token(&self, request: &ClientCredentialsRequest) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.url)
            .form(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    unavailable("token endpoint timed out")
                } else {
                    unavailable(format!("token endpoint unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let code = response
                .json::<TokenErrorResponse>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(unavailable(format!(
                "token endpoint returned {status} ({code})"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("undecodable token response: {e}")))?;

        if token.access_token.is_empty() || !token.token_type.eq_ignore_ascii_case(BEARER) {
            return Err(unavailable("token response is not a bearer token"));
        }

        Ok(token)
    }
}
