//! Dual-mode identity for backend services
//!
//! A bearer token, when present, is verified and wins. Without one, the
//! forwarded-identity headers are accepted only if the service is configured
//! to trust the edge gate (it is reachable only through it). In every other
//! case they are dropped before the handler runs.
//!
//! Requests without an identity are not rejected here; handlers that take a
//! [`Principal`] argument reject them with `MISSING_TOKEN`.

use crate::edge_gate::{bearer_token, strip_forwarded_identity};
use crate::principal::{IdentitySource, Principal, X_ACCOUNT_EMAIL, X_ACCOUNT_ID, X_ACCOUNT_ROLES};
use crate::rejection::AuthRejection;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::HeaderMap,
    Error, HttpMessage, ResponseError,
};
use futures::future::{ready, Ready};
use jwt_security::{AuthError, Roles, TokenBlacklist, TokenCodec, TokenType, SERVICE_ROLE};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;

pub struct ServiceIdentity {
    codec: Arc<TokenCodec>,
    blacklist: Option<Arc<TokenBlacklist>>,
    trust_gateway_headers: bool,
}

impl ServiceIdentity {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            blacklist: None,
            trust_gateway_headers: false,
        }
    }

    /// Accept forwarded-identity headers when no bearer token is present
    pub fn trust_gateway_headers(mut self, trust: bool) -> Self {
        self.trust_gateway_headers = trust;
        self
    }

    /// Also reject revoked bearer tokens
    pub fn with_blacklist(mut self, blacklist: Arc<TokenBlacklist>) -> Self {
        self.blacklist = Some(blacklist);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for ServiceIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ServiceIdentityMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ServiceIdentityMiddleware {
            service: Rc::new(service),
            codec: self.codec.clone(),
            blacklist: self.blacklist.clone(),
            trust_gateway_headers: self.trust_gateway_headers,
        }))
    }
}

pub struct ServiceIdentityMiddleware<S> {
    service: Rc<S>,
    codec: Arc<TokenCodec>,
    blacklist: Option<Arc<TokenBlacklist>>,
    trust_gateway_headers: bool,
}

impl<S, B> Service<ServiceRequest> for ServiceIdentityMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let codec = self.codec.clone();
        let blacklist = self.blacklist.clone();
        let trust_gateway_headers = self.trust_gateway_headers;

        Box::pin(async move {
            let bearer = bearer_token(req.headers()).map(str::to_string);
            let from_bearer = bearer.is_some();
            let principal = if let Some(token) = bearer {
                let outcome = verify_bearer(&token, &codec, blacklist.as_deref()).await;
                match outcome {
                    Ok(principal) => Some(principal),
                    Err(err) => {
                        warn!(path = %req.path(), code = err.code(), "Rejected bearer token");
                        let response = AuthRejection(err).error_response();
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                }
            } else if trust_gateway_headers {
                principal_from_headers(req.headers())
            } else {
                None
            };

            // Forwarded headers survive only when they are the identity in use
            if from_bearer || !trust_gateway_headers {
                strip_forwarded_identity(req.headers_mut());
            }
            if let Some(principal) = principal {
                req.extensions_mut().insert(principal);
            }

            service.call(req).await.map(|res| res.map_into_left_body())
        })
    }
}

async fn verify_bearer(
    token: &str,
    codec: &TokenCodec,
    blacklist: Option<&TokenBlacklist>,
) -> Result<Principal, AuthError> {
    let claims = codec.verify(token)?;
    if let Some(blacklist) = blacklist {
        if blacklist.is_revoked(&claims.jti).await {
            return Err(AuthError::TokenRevoked);
        }
    }
    Ok(Principal::from_claims(&claims))
}

fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let subject = read(X_ACCOUNT_ID)?;
    let roles = read(X_ACCOUNT_ROLES)
        .map(|joined| Roles::from_wire(&joined))
        .unwrap_or_default();
    let token_type = if roles.contains(SERVICE_ROLE) {
        TokenType::Service
    } else {
        TokenType::User
    };

    Some(Principal {
        subject,
        roles,
        email: read(X_ACCOUNT_EMAIL),
        token_type,
        scope: None,
        source: IdentitySource::Gateway,
    })
}
