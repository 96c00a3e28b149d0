//! Event engine
//!
//! Bundles the tick and damage dispatchers with the scope registry. The host
//! builds one [`Events`] from the discovered hierarchy and passes it to
//! whatever needs to register or dispatch.

use std::sync::Arc;

use crate::dispatch::{EventDispatcher, Subject};
use crate::hierarchy::ClassHierarchy;
use crate::scope::{ScopeId, ScopeRegistry};

/// Payload of a damage occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct Damage<C> {
    /// Amount of damage
    pub amount: f32,
    /// What caused it
    pub cause: C,
}

/// Dispatcher for per-period updates
pub type TickEvents<S> = EventDispatcher<S, ()>;

/// Dispatcher for damage occurrences
pub type DamageEvents<S, C> = EventDispatcher<S, Damage<C>>;

/// Tick and damage dispatch over one class hierarchy
#[derive(Debug)]
pub struct Events<S: Subject, C> {
    tick: TickEvents<S>,
    damage: DamageEvents<S, C>,
    scopes: ScopeRegistry,
}

impl<S: Subject, C> Events<S, C> {
    /// Create an engine with no listeners and no scopes
    pub fn new(hierarchy: Arc<ClassHierarchy>) -> Self {
        Self {
            tick: EventDispatcher::new(hierarchy.clone()),
            damage: EventDispatcher::new(hierarchy),
            scopes: ScopeRegistry::new(),
        }
    }

    /// Tick registrations
    pub fn tick(&self) -> &TickEvents<S> {
        &self.tick
    }

    /// Damage registrations
    pub fn damage(&self) -> &DamageEvents<S, C> {
        &self.damage
    }

    /// Scope storage
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Dispatch a tick of `subject` in `scope`; `true` = cancelled
    pub fn invoke_tick(&self, scope: ScopeId, subject: &S) -> bool {
        let storage = self.scopes.get_or_create(scope);
        let handle = subject.handle();
        if let Some(cancelled) = storage.lock().tick_memo_mut().get(handle) {
            return cancelled;
        }

        // The scope lock is released while listeners run so they may
        // dispatch further occurrences in the same scope.
        let cancelled = self.tick.fire(subject, &());
        storage.lock().tick_memo_mut().record(handle, cancelled);
        cancelled
    }

    /// Dispatch damage to `subject` in `scope`; `true` = cancelled
    pub fn invoke_damage(&self, scope: ScopeId, subject: &S, amount: f32, cause: C) -> bool {
        let storage = self.scopes.get_or_create(scope);
        let handle = subject.handle();
        if let Some(cancelled) = storage.lock().damage_memo_mut().get(handle) {
            return cancelled;
        }

        let cancelled = self.damage.fire(subject, &Damage { amount, cause });
        storage.lock().damage_memo_mut().record(handle, cancelled);
        cancelled
    }

    /// Clear both memos of `scope`
    ///
    /// Registrations are kept. A scope that never dispatched is left absent.
    pub fn end_period(&self, scope: ScopeId) {
        if let Some(storage) = self.scopes.get(scope) {
            storage.lock().end_period();
        }
    }

    /// Drop a scope and its memos
    pub fn close_scope(&self, scope: ScopeId) {
        if self.scopes.remove(scope).is_some() {
            tracing::debug!(scope = scope.as_u64(), "closed scope");
        }
    }
}
