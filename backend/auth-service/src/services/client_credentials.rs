//! Server side of the client-credentials grant

use crate::config::ServiceClientSeed;
use crate::db::ServiceClientRepository;
use crate::error::{ApiError, Result};
use crate::models::{OAuthTokenRequest, OAuthTokenResponse, ServiceClient};
use crate::security::{hash_password, verify_password};
use jwt_security::{AuthError, IssuedToken, TokenIssuer};
use std::sync::Arc;
use tracing::{info, warn};

pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const DEFAULT_AUDIENCE: &str = "default";

/// A minted service token and the scope it carries
#[derive(Debug, Clone)]
pub struct GrantedServiceToken {
    pub token: IssuedToken,
    pub scope: String,
}

/// Requested scopes, comma separated, trimmed, blanks dropped
fn split_scope(scope: &str) -> Vec<&str> {
    scope
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Effective scope for a request: the requested scopes if any, all allowed
/// scopes otherwise. Every requested scope must be allowed verbatim.
fn resolve_scope(client: &ServiceClient, requested: Option<&str>) -> Result<String> {
    let requested = requested.map(split_scope).unwrap_or_default();
    if requested.is_empty() {
        return Ok(client.full_scope());
    }

    if let Some(denied) = requested.iter().find(|scope| !client.has_scope(scope)) {
        warn!(client_id = %client.client_id, scope = %denied, "Client requested invalid scope");
        return Err(AuthError::ScopeNotAllowed((*denied).to_string()).into());
    }
    Ok(requested.join(","))
}

pub struct ClientCredentialsIssuer {
    clients: Arc<dyn ServiceClientRepository>,
    issuer: Arc<TokenIssuer>,
}

impl ClientCredentialsIssuer {
    pub fn new(clients: Arc<dyn ServiceClientRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self { clients, issuer }
    }

    /// Handle a token endpoint request
    pub async fn exchange(&self, request: &OAuthTokenRequest) -> Result<OAuthTokenResponse> {
        if request.grant_type != GRANT_TYPE_CLIENT_CREDENTIALS {
            return Err(ApiError::UnsupportedGrantType(request.grant_type.clone()));
        }

        let granted = self
            .issue(
                &request.client_id,
                &request.client_secret,
                request.scope.as_deref(),
                request.audience.as_deref(),
            )
            .await?;

        Ok(OAuthTokenResponse {
            access_token: granted.token.token,
            token_type: "Bearer",
            expires_in: granted.token.expires_in,
            scope: granted.scope,
        })
    }

    pub async fn issue(
        &self,
        client_id: &str,
        client_secret: &str,
        requested_scope: Option<&str>,
        audience: Option<&str>,
    ) -> Result<GrantedServiceToken> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| {
                warn!(client_id = %client_id, "Unknown service client");
                AuthError::UnknownClient
            })?;

        if !client.enabled {
            warn!(client_id = %client_id, "Service client is disabled");
            return Err(AuthError::ClientDisabled.into());
        }

        if !verify_password(client_secret, &client.secret_hash)? {
            warn!(client_id = %client_id, "Invalid client secret");
            return Err(AuthError::InvalidSecret.into());
        }

        let scope = resolve_scope(&client, requested_scope)?;
        let audience = audience
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_AUDIENCE);

        let token = self
            .issuer
            .issue_service_token(&client.client_id, audience, &scope)?;

        info!(
            client_id = %client.client_id,
            audience = %audience,
            scope = %scope,
            "Generated service token"
        );
        Ok(GrantedServiceToken { token, scope })
    }
}

/// Register seeded clients that do not exist yet; returns how many were created
pub async fn provision_clients(
    clients: &dyn ServiceClientRepository,
    seeds: &[ServiceClientSeed],
) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        let client = ServiceClient {
            client_id: seed.client_id.clone(),
            secret_hash: hash_password(&seed.client_secret)?,
            allowed_scopes: seed.scopes.clone(),
            enabled: true,
        };
        if clients.insert_if_absent(&client).await? {
            info!(client_id = %client.client_id, "Provisioned service client");
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryServiceClientRepository;
    use jwt_security::test_utils::rsa_issuer;
    use jwt_security::TokenType;

    struct Fixture {
        credentials: ClientCredentialsIssuer,
        clients: Arc<InMemoryServiceClientRepository>,
        codec: Arc<jwt_security::TokenCodec>,
    }

    async fn fixture() -> Fixture {
        let (issuer, codec, _) = rsa_issuer();
        let clients = Arc::new(InMemoryServiceClientRepository::new());
        let seeds = vec![ServiceClientSeed {
            client_id: "billing-service".into(),
            client_secret: "billing-secret".into(),
            scopes: ["ledger.read".to_string(), "ledger.write".to_string()].into(),
        }];
        provision_clients(clients.as_ref(), &seeds).await.unwrap();

        Fixture {
            credentials: ClientCredentialsIssuer::new(clients.clone(), issuer),
            clients,
            codec,
        }
    }

    fn request(scope: Option<&str>) -> OAuthTokenRequest {
        OAuthTokenRequest {
            grant_type: GRANT_TYPE_CLIENT_CREDENTIALS.into(),
            client_id: "billing-service".into(),
            client_secret: "billing-secret".into(),
            scope: scope.map(str::to_string),
            audience: Some("ledger-service".into()),
        }
    }

    #[tokio::test]
    async fn test_exchange_mints_service_token() {
        let fx = fixture().await;
        let response = fx.credentials.exchange(&request(Some("ledger.read"))).await.unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.scope, "ledger.read");
        assert_eq!(response.expires_in, 300);

        let claims = fx.codec.verify(&response.access_token).unwrap();
        assert_eq!(claims.token_type, TokenType::Service);
        assert_eq!(claims.sub, "billing-service");
        assert_eq!(claims.aud.as_deref(), Some("ledger-service"));
        assert_eq!(claims.scope.as_deref(), Some("ledger.read"));
    }

    #[tokio::test]
    async fn test_defaults_to_full_scope_and_default_audience() {
        let fx = fixture().await;
        let granted = fx
            .credentials
            .issue("billing-service", "billing-secret", None, None)
            .await
            .unwrap();
        assert_eq!(granted.scope, "ledger.read,ledger.write");

        let claims = fx.codec.verify(&granted.token.token).unwrap();
        assert_eq!(claims.aud.as_deref(), Some(DEFAULT_AUDIENCE));
    }

    #[tokio::test]
    async fn test_scope_must_match_exactly() {
        let fx = fixture().await;
        for scope in ["ledger", "LEDGER.READ", "ledger.read.all", "ledger.read,admin", "ledger.rea"] {
            let err = fx.credentials.exchange(&request(Some(scope))).await.unwrap_err();
            assert!(
                matches!(err, ApiError::Auth(AuthError::ScopeNotAllowed(_))),
                "scope {scope} was accepted"
            );
        }

        let ok = fx
            .credentials
            .exchange(&request(Some(" ledger.write , ledger.read ")))
            .await
            .unwrap();
        assert_eq!(ok.scope, "ledger.write,ledger.read");
    }

    #[tokio::test]
    async fn test_client_failures_are_distinct() {
        let fx = fixture().await;

        let err = fx
            .credentials
            .issue("unknown", "billing-secret", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::UnknownClient)));

        let err = fx
            .credentials
            .issue("billing-service", "wrong", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::InvalidSecret)));

        fx.clients.set_enabled("billing-service", false);
        let err = fx
            .credentials
            .issue("billing-service", "billing-secret", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::ClientDisabled)));
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let fx = fixture().await;
        let mut req = request(None);
        req.grant_type = "password".into();

        let err = fx.credentials.exchange(&req).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedGrantType(g) if g == "password"));
    }

    #[tokio::test]
    async fn test_provisioning_skips_existing_clients() {
        let fx = fixture().await;
        let seeds = vec![ServiceClientSeed {
            client_id: "billing-service".into(),
            client_secret: "rotated-secret".into(),
            scopes: ["admin".to_string()].into(),
        }];
        assert_eq!(provision_clients(fx.clients.as_ref(), &seeds).await.unwrap(), 0);

        // Original secret still works
        assert!(fx
            .credentials
            .issue("billing-service", "billing-secret", None, None)
            .await
            .is_ok());
    }
}
