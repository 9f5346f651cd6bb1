// src/resolver/cache.rs

//! TTL cache for symbol -> contract address lookups.
//!
//! Expiry is checked lazily at read time; the clock is supplied by the
//! caller so tests can drive it. Concurrent inserts of the same key are
//! last-write-wins.

use crate::resolver::TokenInfo;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    info: TokenInfo,
    inserted_at: Instant,
}

pub struct SymbolCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl SymbolCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, symbol: &str, now: Instant) -> Option<TokenInfo> {
        let key = normalize(symbol);
        let expired = match self.entries.get(&key) {
            Some(entry) => {
                if now.saturating_duration_since(entry.inserted_at) < self.ttl {
                    return Some(entry.info.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        None
    }

    pub fn insert(&self, symbol: &str, info: TokenInfo, now: Instant) {
        self.entries.insert(
            normalize(symbol),
            CacheEntry {
                info,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
