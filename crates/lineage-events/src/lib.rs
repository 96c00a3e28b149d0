//! Lineage event dispatch
//!
//! Before/after/cancel listeners keyed by class (with ancestor inheritance),
//! by type tag and by predicate, with once-per-period memoization per scope.
//!
//! # Example
//!
//! ```ignore
//! let hierarchy = Arc::new(ClassHierarchy::from_links(root, report.superclasses)?);
//! let events: Events<Mob, Cause> = Events::new(hierarchy);
//! events.damage().all().register_before(|mob, dmg| Verdict::from_cancel(dmg.amount > 100.0));
//! let cancelled = events.invoke_damage(scope, &mob, 120.0, cause);
//! ```

#![warn(missing_docs)]

pub mod chain;
pub mod dispatch;
pub mod engine;
pub mod hierarchy;
pub mod scope;
pub mod verdict;

pub use chain::EventChain;
pub use dispatch::{EventDispatcher, InstanceHandle, OccurrenceMemo, Predicate, Subject};
pub use engine::{Damage, DamageEvents, Events, TickEvents};
pub use hierarchy::{ClassHierarchy, ClassId, HierarchyError};
pub use scope::{ScopeId, ScopeRegistry, ScopeStorage};
pub use verdict::Verdict;
