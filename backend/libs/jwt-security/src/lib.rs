//! Token lifecycle primitives shared by the auth service, the edge gate and
//! every backend service
//!
//! **Components**:
//! - Key provider: RS256 key pair, or the deprecated HS256 shared secret
//! - Token codec: sign, verify (structure, algorithm, signature, expiry, issuer)
//! - Token issuer: user and service tokens with a fresh `jti` each
//! - Token blacklist: revocation for the remaining token lifetime, fail-open lookups
//! - TTL store: Redis or in-memory key-value store with expiry

pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod secret_validation;
pub mod store;
pub mod token_blacklist;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use claims::{Claims, Roles, TokenType, ROLE_PREFIX, SERVICE_ROLE};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use codec::TokenCodec;
pub use config::{JwtSettings, MAX_TOKEN_TTL_SECS};
pub use error::{AuthError, Result};
pub use issuer::{IssuedToken, TokenIssuer, UserIdentity};
pub use keys::{KeyProvider, SigningScheme};
pub use secret_validation::{validate_secret_strength, SecretStrength};
pub use store::{MemoryTtlStore, RedisTtlStore, TtlStore};
pub use token_blacklist::{RevokeOutcome, TokenBlacklist};
