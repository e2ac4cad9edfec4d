//! # Replay Protection
//!
//! Cache of consumed instruction nonces, keyed to each instruction's signed
//! `valid_until`.
//!
//! A nonce is only forgotten once its instruction has expired, and expired
//! instructions are rejected before the cache is consulted. The cache is
//! bounded: when it is full of live nonces, new instructions are refused
//! until some expire.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current unix time in seconds.
#[must_use]
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Outcome of [`NonceCache::check_and_insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceStatus {
    /// Nonce was unseen and is now consumed.
    Fresh,
    /// Nonce was already consumed by a live instruction.
    Replay,
    /// Cache is full of live nonces; nothing was recorded.
    Saturated,
}

/// Thread-safe nonce cache for replay prevention.
///
/// ## Usage
///
/// ```rust,ignore
/// let cache = NonceCache::new(100_000);
///
/// // First attempt - nonce is fresh
/// assert_eq!(cache.check_and_insert(nonce, valid_until, now), NonceStatus::Fresh);
///
/// // Second attempt - replay detected!
/// assert_eq!(cache.check_and_insert(nonce, valid_until, now), NonceStatus::Replay);
/// ```
#[derive(Debug)]
pub struct NonceCache {
    capacity: usize,
    /// Map of nonce -> unix second after which its instruction is expired.
    cache: Mutex<HashMap<Uuid, u64>>,
}

impl NonceCache {
    /// Cache remembering at most `capacity` live nonces.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Consume `nonce` for an instruction valid until `valid_until`.
    ///
    /// Expired entries are only dropped when the cache is full.
    pub fn check_and_insert(&self, nonce: Uuid, valid_until: u64, now: u64) -> NonceStatus {
        let mut cache = self.cache.lock();

        if let Some(&expiry) = cache.get(&nonce) {
            if expiry >= now {
                return NonceStatus::Replay;
            }
        }

        if cache.len() >= self.capacity && !cache.contains_key(&nonce) {
            cache.retain(|_, expiry| *expiry >= now);
            if cache.len() >= self.capacity {
                return NonceStatus::Saturated;
            }
        }

        cache.insert(nonce, valid_until);
        NonceStatus::Fresh
    }

    /// Returns true if `nonce` is currently remembered.
    #[must_use]
    pub fn contains(&self, nonce: &Uuid) -> bool {
        self.cache.lock().contains_key(nonce)
    }

    /// Returns the current number of cached nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
