//! # Actix Middleware Library
//!
//! Authentication middleware shared by the edge and the backend services
//!
//! ## Modules
//! - `edge_gate`: public-path classification, bearer verification, revocation
//!   check and forwarded-identity stamping at the edge
//! - `service_identity`: dual-mode identity for backend services (bearer token
//!   or trusted forwarded headers)
//! - `principal`: the authenticated caller, available as a handler argument
//! - `rejection`: error envelope for authentication failures

pub mod edge_gate;
pub mod principal;
pub mod rejection;
pub mod service_identity;

pub use edge_gate::{
    bearer_token, Access, EdgeAuthGate, PathPolicy, DEFAULT_PUBLIC_PATHS,
    DEFAULT_PUBLIC_READ_PATHS,
};
pub use principal::{
    IdentitySource, Principal, FORWARDED_IDENTITY_HEADERS, X_ACCOUNT_EMAIL, X_ACCOUNT_ID,
    X_ACCOUNT_ROLES,
};
pub use rejection::AuthRejection;
pub use service_identity::ServiceIdentity;
