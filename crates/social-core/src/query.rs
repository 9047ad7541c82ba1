//! Query cache with explicit invalidation
//!
//! Reads go through [`QueryCache::get_or_fetch`] under a [`QueryKey`].
//! Writes never touch the cache directly: a mutation returns a
//! [`Mutation`] naming the keys its server-side effect made stale, and the
//! caller hands those to [`QueryCache::invalidate`] and refetches them.
//!
//! ```rust
//! use clgvibe_social_core::{QueryCache, QueryKey, SocialResult};
//!
//! # tokio_test::block_on(async {
//! let cache = QueryCache::new();
//! let friends = cache
//!     .get_or_fetch(QueryKey::Friends, || async { SocialResult::Ok(vec!["u2"]) })
//!     .await?;
//! assert_eq!(friends.len(), 1);
//!
//! assert_eq!(cache.invalidate(&[QueryKey::Friends]), 1);
//! assert!(!cache.contains(QueryKey::Friends));
//! # Ok::<(), clgvibe_social_core::SocialError>(())
//! # }).unwrap();
//! ```

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::SocialResult;

/// Cached queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKey {
    /// The current user's friends
    Friends,
    /// Suggested users
    RecommendedUsers,
    /// Pending requests the current user sent
    OutgoingRequests,
    /// Incoming and outgoing requests together
    FriendRequests,
}

impl QueryKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::Friends => "friends",
            QueryKey::RecommendedUsers => "recommendedUsers",
            QueryKey::OutgoingRequests => "outgoingFriendReqs",
            QueryKey::FriendRequests => "friendRequests",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a write, plus the queries it made stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<T> {
    pub value: T,
    pub invalidates: Vec<QueryKey>,
}

impl<T> Mutation<T> {
    pub fn new(value: T, invalidates: impl Into<Vec<QueryKey>>) -> Self {
        Self {
            value,
            invalidates: invalidates.into(),
        }
    }

    pub fn invalidates_key(&self, key: QueryKey) -> bool {
        self.invalidates.contains(&key)
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: DateTime<Utc>,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

const INVALIDATION_CHANNEL_CAPACITY: usize = 32;

pub struct QueryCache {
    entries: DashMap<QueryKey, CacheEntry>,
    invalidations_tx: broadcast::Sender<Vec<QueryKey>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidations_tx, _) = broadcast::channel(INVALIDATION_CHANNEL_CAPACITY);
        Self {
            entries: DashMap::new(),
            invalidations_tx,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, or run `fetch` and cache its result.
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> SocialResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = SocialResult<T>>,
    {
        if let Some(value) = self.get::<T>(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Query cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Fetching query");
        let value = fetch().await?;
        Ok(self.insert(key, value))
    }

    /// Cached value for `key` if present and of type `T`
    pub fn get<T: Send + Sync + 'static>(&self, key: QueryKey) -> Option<Arc<T>> {
        let entry = self.entries.get(&key)?;
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                fetched_at: Utc::now(),
            },
        );
        value
    }

    /// When `key` was last fetched
    pub fn fetched_at(&self, key: QueryKey) -> Option<DateTime<Utc>> {
        self.entries.get(&key).map(|entry| entry.fetched_at)
    }

    pub fn contains(&self, key: QueryKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Drop the named keys and tell subscribers. Returns how many were cached.
    pub fn invalidate(&self, keys: &[QueryKey]) -> usize {
        let dropped = keys
            .iter()
            .filter(|key| self.entries.remove(*key).is_some())
            .count();
        self.invalidations.fetch_add(keys.len() as u64, Ordering::Relaxed);
        debug!(keys = ?keys, dropped, "Invalidated queries");

        // Nobody listening is fine
        let _ = self.invalidations_tx.send(keys.to_vec());
        dropped
    }

    /// Invalidation notices from now on
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<Vec<QueryKey>> {
        self.invalidations_tx.subscribe()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<QueryKey> = self.entries.iter().map(|entry| *entry.key()).collect();
        keys.sort();
        f.debug_struct("QueryCache")
            .field("keys", &keys)
            .field("stats", &self.stats())
            .finish()
    }
}
