//! A cache for derived DNS names.
//!
//! Deriving the set of DNS names for an identifier involves IDNA
//! conversion and SHA-1 hashing. The result only depends on the module
//! number and the identifier, so it is kept for a while in a
//! [LocationCache] that is shared by all resolutions of a client.
//!
//! The cache is a pass-through: a miss computes the value under the cache’s
//! own lock so concurrent lookups for the same key compute it only once.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::config::Config;
use crate::identifier::Identifier;
use crate::location::LocationSet;
use moka::sync::Cache;
use std::fmt;
use std::time::Duration;

//------------ CacheKey ------------------------------------------------------

/// The key of a cache entry: module number and identifier.
type CacheKey = (u32, Identifier);

//------------ LocationCache -------------------------------------------------

/// A time limited cache of location sets.
///
/// Cloning the value is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct LocationCache {
    /// The underlying cache.
    cache: Cache<CacheKey, LocationSet>,
}

impl LocationCache {
    /// Creates a new cache.
    ///
    /// Entries expire `ttl` after they have been inserted. At most
    /// `capacity` entries are kept.
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Creates a new cache using the values from a client config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_ttl(), config.cache_capacity())
    }

    /// Returns the cached value or inserts the result of `init`.
    ///
    /// Concurrent callers for the same key wait for a single call of
    /// `init`.
    pub fn get_with(
        &self,
        module: u32,
        identifier: &Identifier,
        init: impl FnOnce() -> LocationSet,
    ) -> LocationSet {
        self.cache.get_with((module, identifier.clone()), init)
    }

    /// Returns the cached value, if there is one.
    pub fn get(
        &self,
        module: u32,
        identifier: &Identifier,
    ) -> Option<LocationSet> {
        self.cache.get(&(module, identifier.clone()))
    }

    /// Returns whether there is a value for the given key.
    pub fn contains(&self, module: u32, identifier: &Identifier) -> bool {
        self.cache.contains_key(&(module, identifier.clone()))
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all()
    }
}

impl fmt::Debug for LocationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

//============ Tests =========================================================
