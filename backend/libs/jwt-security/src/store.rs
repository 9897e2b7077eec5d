//! Key-value store with per-key expiry
//!
//! Backs the revocation registry and the refresh credential store. Both rely
//! on the store's own expiry; nothing sweeps it.

use crate::clock::{SharedClock, SystemClock};
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remaining lifetime in seconds; `None` when absent or persistent
    async fn ttl(&self, key: &str) -> Result<Option<i64>>;

    /// Add to a set and (re)arm the set's expiry
    async fn set_add(&self, set_key: &str, member: &str, ttl_secs: u64) -> Result<()>;

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>>;

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()>;
}

/// Redis implementation over a shared `ConnectionManager`
#[derive(Clone)]
pub struct RedisTtlStore {
    conn: ConnectionManager,
    op_timeout: std::time::Duration,
}

impl RedisTtlStore {
    pub fn new(conn: ConnectionManager, op_timeout: std::time::Duration) -> Self {
        Self { conn, op_timeout }
    }

    async fn with_timeout<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(op, error = %e, "Redis command failed");
                Err(AuthError::Storage(e.to_string()))
            }
            Err(_) => {
                error!(op, timeout_ms = self.op_timeout.as_millis() as u64, "Redis command timed out");
                Err(AuthError::Storage(format!("redis {op} timed out")))
            }
        }
    }
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout("SET", async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.with_timeout("GET", async {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.with_timeout("EXISTS", async {
            redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout("DEL", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let secs: i64 = self
            .with_timeout("TTL", async {
                redis::cmd("TTL").arg(key).query_async(&mut conn).await
            })
            .await?;
        // -2: missing, -1: no expiry
        Ok((secs >= 0).then_some(secs))
    }

    async fn set_add(&self, set_key: &str, member: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout("SADD", async {
            redis::pipe()
                .atomic()
                .cmd("SADD")
                .arg(set_key)
                .arg(member)
                .ignore()
                .cmd("EXPIRE")
                .arg(set_key)
                .arg(ttl_secs)
                .ignore()
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.with_timeout("SMEMBERS", async {
            redis::cmd("SMEMBERS").arg(set_key).query_async(&mut conn).await
        })
        .await
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout("SREM", async {
            redis::cmd("SREM")
                .arg(set_key)
                .arg(member)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }
}

#[derive(Debug, Clone)]
enum Stored {
    Value(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    data: Stored,
    expires_at: DateTime<Utc>,
}

/// In-process store with lazy expiry, for tests and single-node setups
pub struct MemoryTtlStore {
    entries: DashMap<String, Entry>,
    clock: SharedClock,
}

impl Default for MemoryTtlStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryTtlStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn expiry(&self, ttl_secs: u64) -> Result<DateTime<Utc>> {
        i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Storage(format!("ttl of {ttl_secs}s is out of range")))
    }

    /// Live entry for `key`, dropping it if it has expired
    fn live(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?.clone();
        if entry.expires_at <= now {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
            return None;
        }
        Some(entry)
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let expires_at = self.expiry(ttl_secs)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                data: Stored::Value(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key).and_then(|e| match e.data {
            Stored::Value(v) => Some(v),
            Stored::Set(_) => None,
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let now = self.clock.now();
        Ok(self
            .live(key)
            .map(|e| (e.expires_at - now).num_seconds()))
    }

    async fn set_add(&self, set_key: &str, member: &str, ttl_secs: u64) -> Result<()> {
        // Drop an expired set before appending to it
        self.live(set_key);
        let expires_at = self.expiry(ttl_secs)?;

        let mut entry = self.entries.entry(set_key.to_string()).or_insert_with(|| Entry {
            data: Stored::Set(BTreeSet::new()),
            expires_at,
        });
        entry.expires_at = expires_at;
        match &mut entry.data {
            Stored::Set(members) => {
                members.insert(member.to_string());
            }
            Stored::Value(_) => {
                return Err(AuthError::Storage(format!(
                    "{set_key} holds a value, not a set"
                )))
            }
        }
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>> {
        Ok(match self.live(set_key).map(|e| e.data) {
            Some(Stored::Set(members)) => members.into_iter().collect(),
            _ => Vec::new(),
        })
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()> {
        if let Some(mut entry) = self.entries.get_mut(set_key) {
            if let Stored::Set(members) = &mut entry.data {
                members.remove(member);
            }
        }
        Ok(())
    }
}
