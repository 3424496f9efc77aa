// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped cache of calculated permissions.
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};
use vouch_core::{Scope, UserId};

use crate::config::CacheConfig;
use crate::permission_set::PermissionSet;

/// Key of a cache entry.
///
/// Scopes are normalised on construction, an unrestricted scope always maps to the same key no
/// matter how it was built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user: UserId,
    pub scope: Scope,
}

impl CacheKey {
    pub fn new(user: UserId, scope: Scope) -> Self {
        Self { user, scope }
    }
}

#[derive(Debug)]
struct Entry {
    value: Arc<PermissionSet>,
    inserted_at: Instant,

    /// Invalidation clock when the calculation started.
    stamp: u64,
}

impl Entry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.inserted_at.elapsed() >= ttl)
    }
}

#[derive(Debug)]
struct Shard {
    entries: LruCache<CacheKey, Entry>,

    /// Invalidation clock of the last invalidation per user.
    invalidated: LruCache<UserId, u64>,

    /// Entries calculated before this clock are outdated for every user of the shard. Raised when
    /// all entries are invalidated and when a user falls out of `invalidated`.
    floor: u64,
}

impl Shard {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            invalidated: LruCache::new(capacity),
            floor: 0,
        }
    }

    fn invalidated_at(&self, user: UserId) -> u64 {
        self.invalidated
            .peek(&user)
            .map_or(self.floor, |at| (*at).max(self.floor))
    }

    fn invalidate(&mut self, user: UserId, at: u64) {
        let at = self.invalidated.peek(&user).map_or(at, |last| (*last).max(at));
        let evicted = self.invalidated.push(user, at);
        if let Some((_, last)) = evicted.filter(|(evicted, _)| *evicted != user) {
            self.floor = self.floor.max(last);
        }

        let keys: Vec<CacheKey> = self
            .entries
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| key.user == user)
            .collect();
        for key in keys {
            self.entries.pop(&key);
        }
    }

    /// Drop expired entries from the least recently used end.
    fn purge_expired(&mut self, ttl: Option<Duration>) {
        while self
            .entries
            .peek_lru()
            .is_some_and(|(_, entry)| entry.is_expired(ttl))
        {
            self.entries.pop_lru();
        }
    }
}

/// Memoizes calculated permissions per user and scope.
///
/// Entries are distributed over independently locked shards by user id, each holding a bounded
/// number of entries and dropping the least recently used ones first. Every invalidation advances
/// a clock, a calculation which overlapped with an invalidation of its user is returned to its
/// caller but never stored. No entry is served which is older than the last invalidation of its
/// user.
#[derive(Debug)]
pub struct PermissionCache {
    config: CacheConfig,
    shards: Vec<Mutex<Shard>>,
    clock: AtomicU64,
}

impl PermissionCache {
    pub fn new(config: CacheConfig) -> Self {
        let count = config.shards.max(1);
        let capacity =
            NonZeroUsize::new(config.capacity.div_ceil(count)).unwrap_or(NonZeroUsize::MIN);
        let shards = (0..count).map(|_| Mutex::new(Shard::new(capacity))).collect();

        Self {
            config,
            shards,
            clock: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard(&self, user: UserId) -> &Mutex<Shard> {
        let index = (user.0 % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Look up a fresh entry.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<PermissionSet>> {
        if !self.config.enabled {
            return None;
        }

        self.lookup(key).await
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Arc<PermissionSet>> {
        let mut shard = self.shard(key.user).lock().await;
        let invalidated_at = shard.invalidated_at(key.user);

        let entry = shard.entries.get(key)?;
        if entry.stamp >= invalidated_at && !entry.is_expired(self.config.ttl) {
            return Some(entry.value.clone());
        }

        trace!("dropping stale cache entry for user {}", key.user);
        shard.entries.pop(key);
        None
    }

    /// Return the cached permissions for the key or calculate and store them.
    ///
    /// Errors of the calculation are handed to the caller and nothing is stored. The same happens
    /// when the calculation future is dropped before it completed.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<PermissionSet>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PermissionSet, E>>,
    {
        if !self.config.enabled {
            return compute().await.map(Arc::new);
        }

        let stamp = self.clock.load(Ordering::SeqCst);
        if let Some(value) = self.lookup(&key).await {
            trace!("cache hit for user {}", key.user);
            return Ok(value);
        }

        trace!("cache miss for user {}", key.user);
        let value = Arc::new(compute().await?);

        let mut shard = self.shard(key.user).lock().await;
        if stamp < shard.invalidated_at(key.user) {
            debug!(
                "permissions of user {} were invalidated during calculation, not caching them",
                key.user
            );
            return Ok(value);
        }

        shard.purge_expired(self.config.ttl);
        shard.entries.push(
            key,
            Entry {
                value: value.clone(),
                inserted_at: Instant::now(),
                stamp,
            },
        );

        Ok(value)
    }

    /// Drop every entry of a user, all scopes included.
    pub async fn invalidate_user(&self, user: UserId) {
        let at = self.tick();
        self.shard(user).lock().await.invalidate(user, at);
        debug!("invalidated cached permissions of user {}", user);
    }

    /// Drop every entry.
    pub async fn invalidate_all(&self) {
        let at = self.tick();
        for shard in &self.shards {
            let mut shard = shard.lock().await;
            shard.floor = shard.floor.max(at);
            shard.entries.clear();
        }
        debug!("invalidated all cached permissions");
    }

    /// Number of stored entries, stale ones included.
    pub async fn len(&self) -> usize {
        let mut len = 0;
        for shard in &self.shards {
            len += shard.lock().await.entries.len();
        }
        len
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
