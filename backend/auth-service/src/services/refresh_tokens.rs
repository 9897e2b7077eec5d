//! Refresh credential store
//!
//! A credential is 32 random bytes handed to the client as base64url. Only
//! `base64url(sha256(raw))` is kept server side, as the lookup key:
//! - `refresh:token:{lookup_key}`: JSON record, expires with the credential
//! - `refresh:account:{account_id}`: set of the account's lookup keys
//!
//! Redemption does not consume the credential. Rotation is revoke + issue.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jwt_security::{AuthError, Result, SharedClock, TtlStore, MAX_TOKEN_TTL_SECS};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REFRESH_TOKEN_KEY_PREFIX: &str = "refresh:token:";
pub const REFRESH_ACCOUNT_KEY_PREFIX: &str = "refresh:account:";

const RAW_CREDENTIAL_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub lookup_key: String,
    pub account_id: String,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Credential returned once, at issuance
#[derive(Clone)]
pub struct IssuedRefreshToken {
    /// Wire form for the client
    pub token: String,
    pub lookup_key: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("token", &"[REDACTED]")
            .field("lookup_key", &self.lookup_key)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lookup key for a raw credential
pub fn lookup_key(raw: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(raw))
}

fn token_key(lookup_key: &str) -> String {
    format!("{REFRESH_TOKEN_KEY_PREFIX}{lookup_key}")
}

fn account_key(account_id: &str) -> String {
    format!("{REFRESH_ACCOUNT_KEY_PREFIX}{account_id}")
}

/// Raw bytes from the wire form, or `RefreshFormatInvalid`
fn decode(token: &str) -> Result<Vec<u8>> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| AuthError::RefreshFormatInvalid)?;
    if raw.len() != RAW_CREDENTIAL_LEN {
        return Err(AuthError::RefreshFormatInvalid);
    }
    Ok(raw)
}

pub struct RefreshTokenStore {
    store: Arc<dyn TtlStore>,
    clock: SharedClock,
    ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(store: Arc<dyn TtlStore>, clock: SharedClock, ttl_secs: i64) -> Result<Self> {
        let ttl = Duration::try_seconds(ttl_secs)
            .filter(|_| ttl_secs > 0 && ttl_secs <= MAX_TOKEN_TTL_SECS)
            .ok_or_else(|| {
                AuthError::Internal(format!(
                    "refresh token lifetime {ttl_secs}s is outside 1..={MAX_TOKEN_TTL_SECS}"
                ))
            })?;
        Ok(Self { store, clock, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.num_seconds().unsigned_abs()
    }

    pub async fn issue(&self, account_id: &str, device_id: Option<&str>) -> Result<IssuedRefreshToken> {
        let mut raw = [0u8; RAW_CREDENTIAL_LEN];
        rand::thread_rng().fill_bytes(&mut raw);

        let now = self.clock.now();
        let record = RefreshRecord {
            lookup_key: lookup_key(&raw),
            account_id: account_id.to_string(),
            device_id: device_id.map(str::to_string),
            created_at: now,
            expires_at: now + self.ttl,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| AuthError::Internal(format!("failed to encode refresh record: {e}")))?;

        self.store
            .set_ex(&token_key(&record.lookup_key), &json, self.ttl_secs())
            .await?;
        self.store
            .set_add(&account_key(account_id), &record.lookup_key, self.ttl_secs())
            .await?;

        info!(
            account_id = %account_id,
            device_id = ?record.device_id,
            lookup_key = %record.lookup_key,
            "Created refresh token"
        );

        Ok(IssuedRefreshToken {
            token: URL_SAFE_NO_PAD.encode(raw),
            lookup_key: record.lookup_key,
            expires_at: record.expires_at,
        })
    }

    /// Record behind a credential. Leaves the credential in place.
    pub async fn redeem(&self, token: &str) -> Result<RefreshRecord> {
        let raw = decode(token)?;
        let key = lookup_key(&raw);

        let record = self.load(&key).await?.ok_or(AuthError::RefreshNotFound)?;

        // The backing store's expiry is not trusted on its own
        if record.expires_at < self.clock.now() {
            self.remove(&record).await?;
            warn!(lookup_key = %key, "Refresh token expired");
            return Err(AuthError::RefreshExpired);
        }

        debug!(account_id = %record.account_id, "Refresh token verified");
        Ok(record)
    }

    /// Delete one credential. Unknown or malformed credentials are ignored.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let raw = match decode(token) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("Ignoring revocation of malformed refresh token");
                return Ok(());
            }
        };
        let key = lookup_key(&raw);

        match self.load(&key).await? {
            Some(record) => self.remove(&record).await?,
            None => self.store.delete(&token_key(&key)).await?,
        }
        info!(lookup_key = %key, "Revoked refresh token");
        Ok(())
    }

    /// Delete every credential of an account; returns how many were indexed
    pub async fn revoke_all(&self, account_id: &str) -> Result<usize> {
        let index = account_key(account_id);
        let members = self.store.set_members(&index).await?;
        for key in &members {
            self.store.delete(&token_key(key)).await?;
        }
        self.store.delete(&index).await?;

        info!(account_id = %account_id, count = members.len(), "Revoked all refresh tokens");
        Ok(members.len())
    }

    /// Live credentials of an account, oldest first
    pub async fn list_for_account(&self, account_id: &str) -> Result<Vec<RefreshRecord>> {
        let index = account_key(account_id);
        let now = self.clock.now();
        let mut records = Vec::new();

        for key in self.store.set_members(&index).await? {
            match self.load(&key).await? {
                Some(record) if record.expires_at >= now => records.push(record),
                // Expired or gone: drop the stale index entry
                _ => self.store.set_remove(&index, &key).await?,
            }
        }

        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn load(&self, key: &str) -> Result<Option<RefreshRecord>> {
        let Some(json) = self.store.get(&token_key(key)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<RefreshRecord>(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(lookup_key = %key, error = %e, "Discarding unreadable refresh record");
                self.store.delete(&token_key(key)).await?;
                Ok(None)
            }
        }
    }

    async fn remove(&self, record: &RefreshRecord) -> Result<()> {
        self.store.delete(&token_key(&record.lookup_key)).await?;
        self.store
            .set_remove(&account_key(&record.account_id), &record.lookup_key)
            .await
    }
}
