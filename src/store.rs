// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Expiring key-value storage.
//!
//! The guard only needs three primitives from its backing store: a read, a
//! write with a time-to-live, and an insert-or-replace that is conditional on
//! the current value. Any backend that can honour those (Redis, memcached,
//! a replicated KV) can sit behind [`ExpiringStore`]. [`MemoryStore`] is the
//! in-process implementation used by the service binary and the tests.
//!
//! Contract for implementors:
//!
//! - an entry written with TTL `t` is unreadable once `t` has elapsed;
//! - writes to the same key are linearizable;
//! - `compare_and_swap` treats an expired entry exactly like a missing one.

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A key-value store whose entries expire.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Read a live entry. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write an entry that expires `ttl` from now, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Replace the entry only if its current value equals `expected`
    /// (`None` meaning "absent or expired"). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// In-process [`ExpiringStore`] backed by a sharded concurrent map.
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store that expires entries against the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    ///
    /// Reads already ignore expired entries; this only reclaims memory and
    /// should be called periodically.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            debug!(removed, "Purged expired store entries");
        }
        removed
    }

    fn deadline(&self, ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Backend(format!("ttl out of range: {e}")))?;
        self.clock
            .now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Backend("ttl overflows the clock".to_string()))
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = self.deadline(ttl)?;
        self.entries
            .insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl)?;
        let replacement = StoredEntry {
            value: new_value,
            expires_at,
        };

        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = occupied.get();
                let matches = match expected {
                    None => !current.is_live(now),
                    Some(expected) => current.is_live(now) && current.value == expected,
                };
                if matches {
                    occupied.insert(replacement);
                }
                Ok(matches)
            }
            MapEntry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(replacement);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}
