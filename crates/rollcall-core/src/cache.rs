//! # Hot Wizard Cache
//!
//! An LRU cache of open wizard sessions.
//!
//! A wizard is touched once per step, five-plus times over its life, usually
//! within a few minutes. Keeping hot sessions in memory spares the storage
//! layer a read-decode on every step submission. The cache uses a logical
//! clock (monotonic counter), never wall time, so behavior is deterministic.

use crate::primitives::{DraftId, TenantId};
use crate::wizard::EnrollmentWizard;
use serde::Serialize;
use std::collections::BTreeMap;

/// Default maximum number of cached sessions.
pub const DEFAULT_SESSION_CACHE_SIZE: usize = 512;

/// Number of entries evicted in one batch when the cache fills.
pub const EVICTION_BATCH: usize = 32;

type SessionKey = (TenantId, DraftId);

#[derive(Debug, Clone)]
struct SessionSlot {
    wizard: EnrollmentWizard,
    /// Logical timestamp of last access, for LRU ordering.
    last_touch: u64,
}

/// LRU cache for open wizard sessions, keyed by tenant and draft.
#[derive(Debug)]
pub struct WizardCache {
    slots: BTreeMap<SessionKey, SessionSlot>,
    max_size: usize,
    /// Monotonic counter standing in for time.
    clock: u64,
    hits: u64,
    misses: u64,
}

impl Default for WizardCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CACHE_SIZE)
    }
}

impl WizardCache {
    /// Create a cache holding at most `max_size` sessions.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            max_size: max_size.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Fetch a cached wizard, refreshing its LRU position.
    pub fn get(&mut self, tenant: TenantId, draft: DraftId) -> Option<&EnrollmentWizard> {
        self.clock = self.clock.saturating_add(1);
        let tick = self.clock;
        match self.slots.get_mut(&(tenant, draft)) {
            Some(slot) => {
                slot.last_touch = tick;
                self.hits = self.hits.saturating_add(1);
                Some(&slot.wizard)
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                None
            }
        }
    }

    /// Insert or refresh a session. Evicts the stalest batch when full.
    pub fn put(&mut self, wizard: EnrollmentWizard) {
        self.clock = self.clock.saturating_add(1);
        let key = (wizard.tenant(), wizard.id());
        if self.slots.len() >= self.max_size && !self.slots.contains_key(&key) {
            self.evict_stalest();
        }
        self.slots.insert(
            key,
            SessionSlot {
                wizard,
                last_touch: self.clock,
            },
        );
    }

    /// Drop a session, e.g. after finalization.
    pub fn remove(&mut self, tenant: TenantId, draft: DraftId) -> Option<EnrollmentWizard> {
        self.slots.remove(&(tenant, draft)).map(|s| s.wizard)
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hit/miss counters since creation.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.slots.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
        }
    }

    fn evict_stalest(&mut self) {
        // Evict exactly the overflow, capped at one batch.
        let needed = (self.slots.len() + 1)
            .saturating_sub(self.max_size)
            .max(1);
        let batch = needed.min(EVICTION_BATCH).min(self.slots.len());
        // Oldest-first by logical timestamp; ties break on key order so the
        // scan stays deterministic.
        let mut by_age: Vec<(u64, SessionKey)> = self
            .slots
            .iter()
            .map(|(key, slot)| (slot.last_touch, *key))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(batch) {
            self.slots.remove(&key);
        }
    }
}

/// Counters reported by the status surfaces.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

// =============================================================================
// TESTS
// =============================================================================
