// Token and search-result caching between the planner API and the travel
// provider. Both caches are explicit objects owned by the client; expiry is
// absolute (Instant-based) so a token nearing its deadline counts as absent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::offer::FlightSearchResponse;

// The upstream token lives ~30 minutes; refresh once it is within this margin
// of expiring.
pub const DEFAULT_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SEARCH_CAPACITY: usize = 256;

#[derive(Debug, Default)]
pub struct CacheStats {
    pub items_count: AtomicUsize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub eviction_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub eviction_count: usize,
}

impl CacheStats {
    fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.items_count.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            expired_count: self.expired_count.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

// Single-slot OAuth bearer token cache
#[derive(Debug)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
    refresh_margin: Duration,
    stats: CacheStats,
}

impl TokenCache {
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            refresh_margin,
            stats: CacheStats::default(),
        }
    }

    // Returns the cached token unless it is absent or within the refresh
    // margin of expiring.
    pub fn get(&self) -> Option<String> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(cached) if Instant::now() + self.refresh_margin < cached.expires_at => {
                self.stats.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(cached.token.clone())
            }
            Some(_) => {
                *slot = None;
                self.stats.items_count.store(0, Ordering::Relaxed);
                self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
                self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn store(&self, token: String, expires_in: Duration) {
        let mut slot = self.slot.lock();
        *slot = Some(CachedToken {
            token,
            expires_at: Instant::now() + expires_in,
        });
        self.stats.items_count.store(1, Ordering::Relaxed);
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        if slot.take().is_some() {
            self.stats.items_count.store(0, Ordering::Relaxed);
            self.stats.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_REFRESH_MARGIN)
    }
}

#[derive(Debug, Clone)]
pub struct SearchCacheConfig {
    pub max_entries: usize,
    pub default_ttl: Duration,
}

impl Default for SearchCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_SEARCH_CAPACITY,
            default_ttl: DEFAULT_SEARCH_TTL,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSearch {
    response: FlightSearchResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedSearch {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

// Canonical key for one flight search
pub fn search_cache_key(
    origin: &str,
    destination: &str,
    departure_date: &str,
    return_date: Option<&str>,
    adults: u32,
    max_results: usize,
) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        origin.to_ascii_uppercase(),
        destination.to_ascii_uppercase(),
        departure_date,
        return_date.unwrap_or("-"),
        adults,
        max_results
    )
}

// Short-TTL cache of curated flight search responses, bounded in size
#[derive(Debug)]
pub struct SearchCache {
    entries: DashMap<String, CachedSearch>,
    config: SearchCacheConfig,
    stats: CacheStats,
}

impl SearchCache {
    pub fn new(config: SearchCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<FlightSearchResponse> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired() {
                    true
                } else {
                    self.stats.hit_count.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.response.clone());
                }
            }
            None => {
                self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        debug_assert!(expired);
        if self.entries.remove(key).is_some() {
            self.stats.items_count.fetch_sub(1, Ordering::Relaxed);
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn store(&self, key: String, response: FlightSearchResponse, ttl: Option<Duration>) {
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }

        let previous = self.entries.insert(
            key,
            CachedSearch {
                response,
                stored_at: Instant::now(),
                ttl: ttl.unwrap_or(self.config.default_ttl),
            },
        );
        if previous.is_none() {
            self.stats.items_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Drop cached searches whose origin/destination match the given values
    // (None matches any). Returns the number of entries removed.
    pub fn invalidate_route(&self, origin: Option<&str>, destination: Option<&str>) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| {
                let mut parts = entry.key().split(':');
                let key_origin = parts.next().unwrap_or_default();
                let key_destination = parts.next().unwrap_or_default();
                origin.map_or(true, |o| o.eq_ignore_ascii_case(key_origin))
                    && destination.map_or(true, |d| d.eq_ignore_ascii_case(key_destination))
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(&key).is_some() {
                self.stats.items_count.fetch_sub(1, Ordering::Relaxed);
                self.stats.eviction_count.fetch_add(1, Ordering::Relaxed);
                removed += 1;
            }
        }
        removed
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.stats.items_count.fetch_sub(1, Ordering::Relaxed);
                self.stats.eviction_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(SearchCacheConfig::default())
    }
}
