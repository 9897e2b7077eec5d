//! Revocation registry for access tokens
//!
//! A revoked token's `jti` is stored under `token:blacklist:{jti}` for exactly
//! the token's remaining lifetime, so entries disappear when the token would
//! have expired anyway.
//!
//! Lookups fail open: if the store cannot answer, the token is treated as not
//! revoked and the failure is logged. Signature and expiry checks still apply,
//! so an outage of the store only widens the window of a logged-out token.

use crate::codec::TokenCodec;
use crate::error::Result;
use crate::store::TtlStore;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const BLACKLIST_KEY_PREFIX: &str = "token:blacklist:";

/// What a revocation request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked { jti: String, ttl_secs: u64 },
    /// The token had already expired; nothing stored
    AlreadyExpired,
    /// The token could not be read or was not ours; nothing stored
    Unreadable,
}

pub struct TokenBlacklist {
    store: Arc<dyn TtlStore>,
    codec: Arc<TokenCodec>,
}

impl TokenBlacklist {
    pub fn new(store: Arc<dyn TtlStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    fn key(jti: &str) -> String {
        format!("{BLACKLIST_KEY_PREFIX}{jti}")
    }

    /// Blacklist a token until its natural expiry.
    ///
    /// The signature is checked first so forged tokens cannot be used to
    /// write arbitrary entries. Store failures are returned to the caller.
    pub async fn revoke(&self, token: &str) -> Result<RevokeOutcome> {
        let claims = match self.codec.inspect(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Ignoring revocation of unreadable token");
                return Ok(RevokeOutcome::Unreadable);
            }
        };

        let remaining = claims.exp - self.codec.clock().now().timestamp();
        if remaining <= 0 {
            info!(jti = %claims.jti, "Token already expired, nothing to revoke");
            return Ok(RevokeOutcome::AlreadyExpired);
        }

        let ttl_secs = remaining as u64;
        self.store
            .set_ex(&Self::key(&claims.jti), &claims.sub, ttl_secs)
            .await?;

        info!(jti = %claims.jti, subject = %claims.sub, ttl_secs, "Token added to blacklist");
        Ok(RevokeOutcome::Revoked {
            jti: claims.jti,
            ttl_secs,
        })
    }

    /// Point lookup; fails open
    pub async fn is_revoked(&self, jti: &str) -> bool {
        match self.store.exists(&Self::key(jti)).await {
            Ok(revoked) => revoked,
            Err(e) => {
                error!(jti = %jti, error = %e, "Blacklist lookup failed, treating token as not revoked");
                false
            }
        }
    }

    /// Administrative removal of a blacklist entry
    pub async fn unrevoke(&self, jti: &str) -> Result<()> {
        self.store.delete(&Self::key(jti)).await?;
        info!(jti = %jti, "Token removed from blacklist");
        Ok(())
    }

    /// Seconds left on a blacklist entry, if any
    pub async fn remaining_ttl(&self, jti: &str) -> Result<Option<i64>> {
        self.store.ttl(&Self::key(jti)).await
    }
}
