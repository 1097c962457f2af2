//! Signing key cache keyed by (issuer, key ID).
//!
//! Memoizes [`KeyResolver`] results with a per-entry time-to-live. An entry
//! is served only while it is fresh; an expired entry is evicted on lookup
//! and re-resolved. Failed resolutions are never cached, so a transient
//! outage is retried on the next request.
//!
//! # Concurrency
//!
//! The map sits behind a `tokio::sync::RwLock`. The lock is never held while
//! the resolver is talking to the network, so a slow issuer does not stall
//! lookups for other keys. Concurrent misses for the same key may each
//! resolve it; the last write wins.

use crate::auth::resolver::{KeyResolver, PublicKey};
use crate::errors::AuthError;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default key freshness in seconds (24 hours).
pub const DEFAULT_KEY_CACHE_TTL_SECONDS: u64 = 86_400;

/// Largest key freshness accepted from configuration in seconds (30 days).
pub const MAX_KEY_CACHE_TTL_SECONDS: u64 = 2_592_000;

/// Composite cache key: (issuer, kid).
type CacheKey = (String, String);

/// Cached key with expiry time.
struct CachedKey {
    key: Arc<PublicKey>,

    /// When this cache entry expires. `None` when the TTL runs past the
    /// range of `Instant`; such an entry never expires.
    expires_at: Option<Instant>,
}

impl CachedKey {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// Concurrency-safe cache of issuer signing keys.
pub struct SigningKeyCache {
    /// Resolver consulted on a miss.
    resolver: Arc<dyn KeyResolver>,

    /// Cached keys.
    entries: RwLock<HashMap<CacheKey, CachedKey>>,

    /// Freshness duration applied to every new entry.
    ttl: Duration,

    /// Optional bound on the number of entries.
    max_entries: Option<usize>,
}

impl SigningKeyCache {
    /// Create an unbounded cache.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Resolver used on cache misses
    /// * `ttl` - How long a resolved key is trusted before re-resolution
    pub fn new(resolver: Arc<dyn KeyResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    /// Bound the cache to `max_entries` keys.
    ///
    /// When full, expired entries are purged first, then the entry closest
    /// to expiry is evicted.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// Freshness duration of new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the signing key for `(issuer, kid)`.
    ///
    /// Returns the cached key while fresh, otherwise resolves and caches it.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's error unchanged; nothing is cached.
    #[instrument(skip(self), fields(issuer = %issuer, kid = %kid))]
    pub async fn get_key(&self, issuer: &str, kid: &str) -> Result<Arc<PublicKey>, AuthError> {
        let cache_key = (issuer.to_string(), kid.to_string());

        if let Some(key) = self.lookup(&cache_key).await {
            tracing::debug!(target: "gate.auth.cache", "Signing key cache hit");
            metrics::record_key_cache_lookup(true);
            return Ok(key);
        }

        tracing::debug!(target: "gate.auth.cache", "Signing key cache miss");
        metrics::record_key_cache_lookup(false);

        let key = match self.resolver.resolve(issuer, kid).await {
            Ok(key) => {
                metrics::record_key_resolution(true);
                Arc::new(key)
            }
            Err(e) => {
                metrics::record_key_resolution(false);
                tracing::warn!(target: "gate.auth.cache", error = %e, "Signing key resolution failed");
                return Err(e);
            }
        };

        self.insert(cache_key, Arc::clone(&key)).await;
        Ok(key)
    }

    /// Return a fresh entry, evicting it if it has expired.
    async fn lookup(&self, cache_key: &CacheKey) -> Option<Arc<PublicKey>> {
        {
            let entries = self.entries.read().await;
            match entries.get(cache_key) {
                None => return None,
                Some(cached) if cached.is_fresh(Instant::now()) => {
                    return Some(Arc::clone(&cached.key));
                }
                Some(_) => {}
            }
        }

        // Expired: evict unless another task refreshed it meanwhile
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        if entries
            .get(cache_key)
            .is_some_and(|cached| !cached.is_fresh(now))
        {
            entries.remove(cache_key);
            tracing::debug!(target: "gate.auth.cache", "Evicted expired signing key");
        }
        None
    }

    /// Store a freshly resolved key, replacing any previous entry.
    async fn insert(&self, cache_key: CacheKey, key: Arc<PublicKey>) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if let Some(max_entries) = self.max_entries {
            if !entries.contains_key(&cache_key) && entries.len() >= max_entries {
                entries.retain(|_, cached| cached.is_fresh(now));
            }

            while !entries.contains_key(&cache_key) && entries.len() >= max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, cached)| (cached.expires_at.is_none(), cached.expires_at))
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                        tracing::debug!(
                            target: "gate.auth.cache",
                            issuer = %oldest.0,
                            kid = %oldest.1,
                            "Evicted signing key to stay within capacity"
                        );
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            cache_key,
            CachedKey {
                key,
                expires_at: now.checked_add(self.ttl),
            },
        );

        tracing::debug!(target: "gate.auth.cache", entry_count = entries.len(), "Signing key cached");
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, cached| cached.is_fresh(now));
        before - entries.len()
    }

    /// Number of entries currently held, fresh or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
