//! The Keyspace
//!
//! One flat mapping from key to a tagged value (string or sorted set),
//! with a side index of per-key expiry instants. This is the shared
//! resource every connection mutates.
//!
//! ## Concurrency Model
//!
//! The whole keyspace sits behind a single `RwLock`: many concurrent
//! readers, one writer. Each command runs inside one critical section, so
//! its effects commit indivisibly and `DEL`/`EXISTS`/`DBSIZE` counts are
//! exact. The expiry index lives under the same lock, which is what makes
//! deleting a key and its expiry entry atomic.
//!
//! ## Expiry
//!
//! Keys past their expiry instant are logically gone everywhere: reads
//! treat them as missing, writes purge them before proceeding. Physical
//! removal happens lazily on access and through `sweep_expired`, which the
//! background driver calls with a bounded sample size.

use crate::storage::zset::SortedSet;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A value stored under a top-level key. A key holds exactly one variant
/// at a time.
#[derive(Debug, Clone)]
pub enum Value {
    Str(Bytes),
    ZSet(SortedSet),
}

/// Returned when a command addresses a key holding the other variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongType;

/// State guarded by the keyspace lock: the entry table and the expiry
/// index. An expiry entry exists only for a key present in `entries`.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Bytes, Value>,
    expires: HashMap<Bytes, Instant>,
}

impl Inner {
    fn is_past_due(&self, key: &Bytes, now: Instant) -> bool {
        self.expires.get(key).is_some_and(|&at| now >= at)
    }

    /// A key is live if present and not past its expiry instant.
    fn live(&self, key: &Bytes, now: Instant) -> Option<&Value> {
        if self.is_past_due(key, now) {
            None
        } else {
            self.entries.get(key)
        }
    }

    /// Physically removes the key if its expiry has passed.
    fn purge_if_due(&mut self, key: &Bytes, now: Instant) -> bool {
        if self.is_past_due(key, now) {
            self.entries.remove(key);
            self.expires.remove(key);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, key: &Bytes) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.expires.remove(key);
        removed
    }
}

/// The process-wide keyspace shared by all connections and the expiry
/// driver.
///
/// Designed to be wrapped in an `Arc` and cloned into every connection
/// task. All operations are thread-safe and atomic per call.
pub struct Keyspace {
    inner: RwLock<Inner>,
    /// Keys physically removed because their expiry passed
    expired_count: AtomicU64,
    /// Rotating offset into the expiry index for `sweep_expired`
    sweep_cursor: AtomicU64,
}

impl std::fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("Keyspace")
            .field("entries", &inner.entries.len())
            .field("expires", &inner.expires.len())
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            expired_count: AtomicU64::new(0),
            sweep_cursor: AtomicU64::new(0),
        }
    }

    /// Lazily removes the key if it is past due.
    ///
    /// Read paths call this first so they can then treat presence in the
    /// entry table as liveness. The read lock is taken for the common case
    /// where nothing expired; only an actual purge upgrades to the write
    /// lock.
    fn expire_if_due(&self, key: &Bytes) {
        let now = Instant::now();
        {
            let inner = self.inner.read().unwrap();
            if !inner.is_past_due(key, now) {
                return;
            }
        }
        let mut inner = self.inner.write().unwrap();
        // Re-check: another writer may have replaced the key meanwhile.
        if inner.purge_if_due(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // String and key operations
    // ------------------------------------------------------------------

    /// Writes a string value under `key`, replacing any prior variant.
    ///
    /// With `ttl` the key expires after that duration; without it any
    /// existing expiry on the key is removed.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        match ttl {
            Some(d) => {
                inner.expires.insert(key.clone(), now + d);
            }
            None => {
                inner.expires.remove(&key);
            }
        }
        inner.entries.insert(key, Value::Str(value));
    }

    /// Writes a string value only if `key` does not currently hold a live
    /// value of any variant.
    ///
    /// Returns `true` if the write happened.
    pub fn set_nx(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        if inner.purge_if_due(&key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        if inner.entries.contains_key(&key) {
            return false;
        }
        if let Some(d) = ttl {
            inner.expires.insert(key.clone(), now + d);
        }
        inner.entries.insert(key, Value::Str(value));
        true
    }

    /// Reads the string value under `key`.
    pub fn get(&self, key: &Bytes) -> Result<Option<Bytes>, WrongType> {
        self.expire_if_due(key);
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        match inner.live(key, now) {
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(Value::ZSet(_)) => Err(WrongType),
            None => Ok(None),
        }
    }

    /// Deletes one key of any variant. Returns `true` if a live key was
    /// removed; a key that had already expired does not count.
    pub fn del(&self, key: &Bytes) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        if inner.purge_if_due(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        inner.remove(key)
    }

    /// Deletes several keys in one critical section. Returns the count of
    /// live keys actually removed; duplicate names count once each while
    /// live.
    pub fn del_many(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        let mut deleted = 0;
        for key in keys {
            if inner.purge_if_due(key, now) {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if inner.remove(key) {
                deleted += 1;
            }
        }
        deleted
    }

    /// Returns true if `key` currently resolves to a live value.
    pub fn exists(&self, key: &Bytes) -> bool {
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        inner.live(key, now).is_some()
    }

    /// Counts how many of the names resolve to live keys, counting
    /// duplicates per occurrence.
    pub fn exists_many(&self, keys: &[Bytes]) -> u64 {
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        keys.iter().filter(|k| inner.live(k, now).is_some()).count() as u64
    }

    /// Sets the expiry of a live key to now + `ttl`.
    ///
    /// Returns `false` if the key does not exist (or had expired).
    pub fn expire(&self, key: &Bytes, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        if inner.purge_if_due(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if inner.entries.contains_key(key) {
            inner.expires.insert(key.clone(), now + ttl);
            true
        } else {
            false
        }
    }

    /// Remaining time-to-live of a key in whole seconds, rounded toward
    /// zero with a floor of 0.
    ///
    /// Returns `-2` if the key does not exist (or expired) and `-1` if it
    /// exists without an expiry.
    pub fn ttl(&self, key: &Bytes) -> i64 {
        self.expire_if_due(key);
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        if inner.live(key, now).is_none() {
            return -2;
        }
        match inner.expires.get(key) {
            Some(&at) => at.saturating_duration_since(now).as_secs() as i64,
            None => -1,
        }
    }

    /// Number of live top-level keys.
    pub fn dbsize(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .keys()
            .filter(|key| !inner.is_past_due(key, now))
            .count()
    }

    /// Removes every key and every expiry entry.
    pub fn flush(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.expires.clear();
    }

    // ------------------------------------------------------------------
    // Sorted-set operations
    // ------------------------------------------------------------------

    /// Upserts (score, member) pairs into the sorted set at `key`,
    /// creating the set if absent. Returns the count of newly inserted
    /// members; score updates contribute 0.
    pub fn zadd(&self, key: &Bytes, pairs: &[(f64, Bytes)]) -> Result<u64, WrongType> {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        if inner.purge_if_due(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        let zset = match inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Value::ZSet(SortedSet::new()))
        {
            Value::ZSet(zset) => zset,
            Value::Str(_) => return Err(WrongType),
        };
        let mut added = 0;
        for (score, member) in pairs {
            if zset.insert(member.clone(), *score) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes members from the sorted set at `key`. Returns the count
    /// actually removed. Removing the last member deletes the set (and
    /// its expiry entry) from the keyspace.
    pub fn zrem(&self, key: &Bytes, members: &[Bytes]) -> Result<u64, WrongType> {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        if inner.purge_if_due(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        let zset = match inner.entries.get_mut(key) {
            Some(Value::ZSet(zset)) => zset,
            Some(Value::Str(_)) => return Err(WrongType),
            None => return Ok(0),
        };
        let mut removed = 0;
        for member in members {
            if zset.remove(member) {
                removed += 1;
            }
        }
        if zset.is_empty() {
            inner.remove(key);
        }
        Ok(removed)
    }

    /// The score of `member` in the sorted set at `key`, if both exist.
    pub fn zscore(&self, key: &Bytes, member: &Bytes) -> Result<Option<f64>, WrongType> {
        self.with_zset(key, |zset| zset.score(member))
            .map(Option::flatten)
    }

    /// Cardinality of the sorted set at `key`; 0 if absent.
    pub fn zcard(&self, key: &Bytes) -> Result<usize, WrongType> {
        self.with_zset(key, |zset| zset.len())
            .map(|card| card.unwrap_or(0))
    }

    /// The 0-based rank of `member` in `(score, member)` order.
    pub fn zrank(&self, key: &Bytes, member: &Bytes) -> Result<Option<usize>, WrongType> {
        self.with_zset(key, |zset| zset.rank(member))
            .map(Option::flatten)
    }

    /// Index-based range over the sorted set at `key`.
    pub fn zrange(
        &self,
        key: &Bytes,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Bytes, f64)>, WrongType> {
        self.with_zset(key, |zset| zset.range_by_rank(start, stop))
            .map(Option::unwrap_or_default)
    }

    /// Score-based inclusive range over the sorted set at `key`.
    pub fn zrange_by_score(
        &self,
        key: &Bytes,
        min: f64,
        max: f64,
    ) -> Result<Vec<(Bytes, f64)>, WrongType> {
        self.with_zset(key, |zset| zset.range_by_score(min, max))
            .map(Option::unwrap_or_default)
    }

    /// Shared read path for sorted-set queries: lazy-expire, then run `f`
    /// against the live set if there is one.
    fn with_zset<T>(
        &self,
        key: &Bytes,
        f: impl FnOnce(&SortedSet) -> T,
    ) -> Result<Option<T>, WrongType> {
        self.expire_if_due(key);
        let now = Instant::now();
        let inner = self.inner.read().unwrap();
        match inner.live(key, now) {
            Some(Value::ZSet(zset)) => Ok(Some(f(zset))),
            Some(Value::Str(_)) => Err(WrongType),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Active expiry
    // ------------------------------------------------------------------

    /// Samples up to `limit` entries of the expiry index and evicts those
    /// past due. Returns the eviction count.
    ///
    /// The bounded sample keeps the writer critical section short so the
    /// background driver cannot starve client commands. A rotating cursor
    /// picks the sample window, so every entry is visited within
    /// `len / limit` sweeps even when nothing in the current window is
    /// due.
    pub fn sweep_expired(&self, limit: usize) -> u64 {
        let now = Instant::now();
        let mut inner = self.inner.write().unwrap();
        let len = inner.expires.len();
        if len == 0 || limit == 0 {
            return 0;
        }
        let start = (self.sweep_cursor.fetch_add(limit as u64, Ordering::Relaxed) as usize) % len;
        let due: Vec<Bytes> = inner
            .expires
            .iter()
            .cycle()
            .skip(start)
            .take(limit.min(len))
            .filter(|(_, &at)| now >= at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            inner.entries.remove(key);
            inner.expires.remove(key);
        }
        let evicted = due.len() as u64;
        if evicted > 0 {
            self.expired_count.fetch_add(evicted, Ordering::Relaxed);
        }
        evicted
    }

    /// Number of expiry entries currently tracked.
    pub fn expiring_keys(&self) -> usize {
        self.inner.read().unwrap().expires.len()
    }

    /// Total keys evicted by expiry (lazy and active) since startup.
    pub fn expired_total(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }
}
