//! Per-scope storage
//!
//! A scope is one world or session. Each scope owns the tick and damage
//! memos for its current period; scopes never share state.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dispatch::OccurrenceMemo;

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocate a fresh scope id
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a host-assigned id
    pub fn from_raw(raw: u64) -> Self {
        ScopeId(raw)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Memos of one scope, each created on first use
#[derive(Debug, Default)]
pub struct ScopeStorage {
    tick: Option<OccurrenceMemo>,
    damage: Option<OccurrenceMemo>,
}

impl ScopeStorage {
    /// Create storage with no memos yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick memo, if any tick was dispatched this period
    pub fn tick_memo(&self) -> Option<&OccurrenceMemo> {
        self.tick.as_ref()
    }

    /// Tick memo, created if missing
    pub fn tick_memo_mut(&mut self) -> &mut OccurrenceMemo {
        self.tick.get_or_insert_with(OccurrenceMemo::new)
    }

    /// Damage memo, if any damage was dispatched this period
    pub fn damage_memo(&self) -> Option<&OccurrenceMemo> {
        self.damage.as_ref()
    }

    /// Damage memo, created if missing
    pub fn damage_memo_mut(&mut self) -> &mut OccurrenceMemo {
        self.damage.get_or_insert_with(OccurrenceMemo::new)
    }

    /// Clear both memos that exist; never creates one
    pub fn end_period(&mut self) {
        if let Some(memo) = &mut self.tick {
            memo.clear();
        }
        if let Some(memo) = &mut self.damage {
            memo.clear();
        }
    }
}

/// Registry of live scopes
pub struct ScopeRegistry {
    scopes: Mutex<FxHashMap<ScopeId, Arc<Mutex<ScopeStorage>>>>,
}

impl ScopeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Storage for `id`, created on first use
    pub fn get_or_create(&self, id: ScopeId) -> Arc<Mutex<ScopeStorage>> {
        self.scopes.lock().entry(id).or_default().clone()
    }

    /// Storage for `id` if it exists
    pub fn get(&self, id: ScopeId) -> Option<Arc<Mutex<ScopeStorage>>> {
        self.scopes.lock().get(&id).cloned()
    }

    /// Drop a scope and all its state
    pub fn remove(&self, id: ScopeId) -> Option<Arc<Mutex<ScopeStorage>>> {
        self.scopes.lock().remove(&id)
    }

    /// Get the number of live scopes
    pub fn len(&self) -> usize {
        self.scopes.lock().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get all scope IDs
    pub fn all_ids(&self) -> Vec<ScopeId> {
        self.scopes.lock().keys().copied().collect()
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.len())
            .finish()
    }
}
