use crate::rejection::AuthRejection;
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};
use jwt_security::{AuthError, Claims, Roles, TokenType};

/// Forwarded-identity headers stamped by the edge gate
pub const X_ACCOUNT_ID: &str = "x-account-id";
pub const X_ACCOUNT_ROLES: &str = "x-account-roles";
pub const X_ACCOUNT_EMAIL: &str = "x-account-email";

pub const FORWARDED_IDENTITY_HEADERS: [&str; 3] = [X_ACCOUNT_ID, X_ACCOUNT_ROLES, X_ACCOUNT_EMAIL];

/// How the identity reached this service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Verified bearer token
    BearerToken { jti: String },
    /// Headers stamped by the edge gate
    Gateway,
}

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub roles: Roles,
    pub email: Option<String>,
    pub token_type: TokenType,
    pub scope: Option<String>,
    pub source: IdentitySource,
}

impl Principal {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            subject: claims.sub.clone(),
            roles: claims.roles.clone(),
            email: claims.email.clone(),
            token_type: claims.token_type,
            scope: claims.scope.clone(),
            source: IdentitySource::BearerToken {
                jti: claims.jti.clone(),
            },
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_service(&self) -> bool {
        self.token_type == TokenType::Service
    }
}

impl FromRequest for Principal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Principal>() {
            Some(principal) => ready(Ok(principal.clone())),
            None => ready(Err(AuthRejection(AuthError::MissingToken).into())),
        }
    }
}
