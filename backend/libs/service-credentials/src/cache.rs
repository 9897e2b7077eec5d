use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// A minted service token as held by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedServiceToken {
    pub token: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedServiceToken {
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// True while more than `buffer` of lifetime is left
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.remaining(now) > buffer
    }
}

/// Audience-keyed token cache.
///
/// Each entry is replaced as a whole, so readers see either the old or the
/// new token, never a mix. Two callers missing at once may both mint; the
/// later write wins.
#[derive(Debug, Default)]
pub struct ServiceTokenCache {
    entries: DashMap<String, CachedServiceToken>,
}

impl ServiceTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&self, audience: &str, now: DateTime<Utc>, buffer: Duration) -> Option<String> {
        self.entries
            .get(audience)
            .filter(|entry| entry.is_fresh(now, buffer))
            .map(|entry| entry.token.clone())
    }

    pub fn get(&self, audience: &str) -> Option<CachedServiceToken> {
        self.entries.get(audience).map(|entry| entry.clone())
    }

    pub fn put(&self, audience: &str, token: CachedServiceToken) {
        self.entries.insert(audience.to_string(), token);
    }

    pub fn remove(&self, audience: &str) -> bool {
        self.entries.remove(audience).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
