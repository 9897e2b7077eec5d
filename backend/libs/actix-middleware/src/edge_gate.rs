//! Edge authentication gate
//!
//! Every request is classified once:
//! - `OPTIONS` preflight passes untouched
//! - paths under a public prefix pass for any method
//! - paths under a public-read prefix pass for GET and HEAD only
//! - everything else needs a valid, unrevoked bearer token
//!
//! Forwarded-identity headers sent by the client are removed from every
//! request. They are set again only from a verified token.

use crate::principal::{Principal, FORWARDED_IDENTITY_HEADERS, X_ACCOUNT_EMAIL, X_ACCOUNT_ID, X_ACCOUNT_ROLES};
use crate::rejection::AuthRejection;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    http::Method,
    Error, HttpMessage, ResponseError,
};
use futures::future::{ready, Ready};
use jwt_security::{AuthError, Claims, TokenBlacklist, TokenCodec};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/verify-otp",
    "/auth/resend-otp",
    "/auth/refresh",
    "/auth/google/callback",
];

pub const DEFAULT_PUBLIC_READ_PATHS: &[&str] =
    &["/api/blogs/series", "/api/blogs/posts", "/api/courses"];

/// Outcome of classifying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Preflight,
    PublicAnyMethod,
    PublicGetOnly,
    Protected,
}

/// Public and public-read path prefixes
#[derive(Debug, Clone)]
pub struct PathPolicy {
    public: Vec<String>,
    public_read: Vec<String>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_PUBLIC_PATHS.iter().copied(),
            DEFAULT_PUBLIC_READ_PATHS.iter().copied(),
        )
    }
}

impl PathPolicy {
    pub fn new<P, R>(public: P, public_read: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            public: public.into_iter().map(Into::into).collect(),
            public_read: public_read.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, method: &Method, path: &str) -> Access {
        if method == Method::OPTIONS {
            return Access::Preflight;
        }
        if self.public.iter().any(|prefix| matches_prefix(path, prefix)) {
            return Access::PublicAnyMethod;
        }
        let is_read = method == Method::GET || method == Method::HEAD;
        if is_read && self.public_read.iter().any(|prefix| matches_prefix(path, prefix)) {
            return Access::PublicGetOnly;
        }
        Access::Protected
    }
}

/// Prefix match on whole path segments: `/api/courses` covers
/// `/api/courses/42` but not `/api/coursesx`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Bearer credential from the `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub(crate) fn strip_forwarded_identity(headers: &mut HeaderMap) {
    for name in FORWARDED_IDENTITY_HEADERS {
        headers.remove(name);
    }
}

fn stamp_forwarded_identity(headers: &mut HeaderMap, claims: &Claims) -> Result<(), AuthError> {
    let value = |raw: &str| {
        HeaderValue::from_str(raw)
            .map_err(|_| AuthError::MalformedToken("claim is not a valid header value".into()))
    };

    headers.insert(HeaderName::from_static(X_ACCOUNT_ID), value(&claims.sub)?);
    headers.insert(
        HeaderName::from_static(X_ACCOUNT_ROLES),
        value(&claims.roles.to_wire())?,
    );
    if let Some(email) = &claims.email {
        headers.insert(HeaderName::from_static(X_ACCOUNT_EMAIL), value(email)?);
    }
    Ok(())
}

/// Authentication gate for the edge of the system
pub struct EdgeAuthGate {
    codec: Arc<TokenCodec>,
    blacklist: Arc<TokenBlacklist>,
    policy: Arc<PathPolicy>,
}

impl EdgeAuthGate {
    pub fn new(codec: Arc<TokenCodec>, blacklist: Arc<TokenBlacklist>, policy: PathPolicy) -> Self {
        Self {
            codec,
            blacklist,
            policy: Arc::new(policy),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for EdgeAuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = EdgeAuthGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(EdgeAuthGateService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            blacklist: self.blacklist.clone(),
            policy: self.policy.clone(),
        }))
    }
}

pub struct EdgeAuthGateService<S> {
    service: Rc<S>,
    codec: Arc<TokenCodec>,
    blacklist: Arc<TokenBlacklist>,
    policy: Arc<PathPolicy>,
}

impl<S, B> Service<ServiceRequest> for EdgeAuthGateService<S>
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
        let policy = self.policy.clone();

        Box::pin(async move {
            strip_forwarded_identity(req.headers_mut());

            let access = policy.classify(req.method(), req.path());
            debug!(path = %req.path(), method = %req.method(), ?access, "Classified request");

            if access != Access::Protected {
                return service.call(req).await.map(|res| res.map_into_left_body());
            }

            let outcome = authenticate(&req, &codec, &blacklist).await;
            let claims = match outcome {
                Ok(claims) => claims,
                Err(err) => {
                    warn!(path = %req.path(), code = err.code(), "Rejected request at edge");
                    let response = AuthRejection(err).error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            if let Err(err) = stamp_forwarded_identity(req.headers_mut(), &claims) {
                let response = AuthRejection(err).error_response();
                return Ok(req.into_response(response).map_into_right_body());
            }
            req.extensions_mut().insert(Principal::from_claims(&claims));

            service.call(req).await.map(|res| res.map_into_left_body())
        })
    }
}

async fn authenticate(
    req: &ServiceRequest,
    codec: &TokenCodec,
    blacklist: &TokenBlacklist,
) -> Result<Claims, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let claims = codec.verify(token)?;

    if blacklist.is_revoked(&claims.jti).await {
        return Err(AuthError::TokenRevoked);
    }
    Ok(claims)
}
