//! Three-axis event dispatch
//!
//! An [`EventDispatcher`] routes one kind of occurrence to the chains keyed
//! by the subject's exact class (and every ancestor), by its type tag, and
//! by any registered predicate it matches.
//!
//! Before phase order: class chains root-most first, then the tag chain,
//! then predicate chains in registration order. The first decisive verdict
//! ends the phase. Every relevant chain then gets its after- or
//! cancelled-listeners in the same order.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::chain::{panic_message, EventChain};
use crate::hierarchy::{ClassHierarchy, ClassId};
use crate::verdict::Verdict;

/// Stable per-instance handle supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub u64);

/// Something occurrences happen to
pub trait Subject {
    /// Coarse type tag (e.g. an entity type)
    type Tag: Eq + Hash + Clone + Send + Sync;

    /// Per-instance handle used as the memo key
    fn handle(&self) -> InstanceHandle;

    /// Exact class of the instance
    fn class(&self) -> ClassId;

    /// Type tag of the instance
    fn type_tag(&self) -> &Self::Tag;
}

/// Shared predicate over subjects
///
/// Chains are keyed by predicate identity: clones of one `Predicate` share a
/// chain, two separately created predicates never do.
pub struct Predicate<S>(Arc<dyn Fn(&S) -> bool + Send + Sync>);

impl<S> Predicate<S> {
    /// Wrap a closure
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate; a panic is logged and counts as no match
    pub fn test(&self, subject: &S) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.0)(subject))) {
            Ok(matched) => matched,
            Err(payload) => {
                tracing::error!(panic = panic_message(&payload), "predicate panicked");
                false
            }
        }
    }

    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<S> Clone for Predicate<S> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<S> fmt::Debug for Predicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Decisions already taken this period, keyed by instance
#[derive(Debug, Clone, Default)]
pub struct OccurrenceMemo {
    decisions: FxHashMap<InstanceHandle, bool>,
}

impl OccurrenceMemo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded decision for an instance (`true` = cancelled)
    pub fn get(&self, handle: InstanceHandle) -> Option<bool> {
        self.decisions.get(&handle).copied()
    }

    /// Record a decision
    pub fn record(&mut self, handle: InstanceHandle, cancelled: bool) {
        self.decisions.insert(handle, cancelled);
    }

    /// Forget every decision
    pub fn clear(&mut self) {
        self.decisions.clear();
    }

    /// Number of recorded decisions
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

/// Router for one kind of occurrence
///
/// `S` is the subject type and `A` the occurrence payload passed to every
/// listener alongside the subject.
pub struct EventDispatcher<S: Subject, A> {
    hierarchy: Arc<ClassHierarchy>,
    by_class: RwLock<FxHashMap<ClassId, Arc<EventChain<S, A>>>>,
    by_tag: RwLock<FxHashMap<S::Tag, Arc<EventChain<S, A>>>>,
    by_predicate: RwLock<Vec<(Predicate<S>, Arc<EventChain<S, A>>)>>,
}

impl<S: Subject, A> fmt::Debug for EventDispatcher<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("classes", &self.by_class.read().len())
            .field("tags", &self.by_tag.read().len())
            .field("predicates", &self.by_predicate.read().len())
            .finish()
    }
}

impl<S: Subject, A> EventDispatcher<S, A> {
    /// Create a dispatcher over `hierarchy`
    pub fn new(hierarchy: Arc<ClassHierarchy>) -> Self {
        Self {
            hierarchy,
            by_class: RwLock::new(FxHashMap::default()),
            by_tag: RwLock::new(FxHashMap::default()),
            by_predicate: RwLock::new(Vec::new()),
        }
    }

    /// Class table used to resolve ancestors
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    /// Chain for an exact class, created on first use
    pub fn of_class(&self, class: ClassId) -> Arc<EventChain<S, A>> {
        if let Some(chain) = self.by_class.read().get(&class) {
            return chain.clone();
        }
        self.by_class.write().entry(class).or_default().clone()
    }

    /// Chain for a class by internal name
    ///
    /// `None` when the class is not part of the hierarchy: such a class can
    /// never be dispatched, so there is nothing to register on.
    pub fn of_class_name(&self, name: &str) -> Option<Arc<EventChain<S, A>>> {
        self.hierarchy.id(name).map(|id| self.of_class(id))
    }

    /// Chain for the root class; sees every subject
    pub fn all(&self) -> Arc<EventChain<S, A>> {
        self.of_class(self.hierarchy.root())
    }

    /// Chain for a type tag, created on first use
    pub fn of_tag(&self, tag: S::Tag) -> Arc<EventChain<S, A>> {
        if let Some(chain) = self.by_tag.read().get(&tag) {
            return chain.clone();
        }
        self.by_tag.write().entry(tag).or_default().clone()
    }

    /// Chain for a predicate, created on first use
    pub fn matching(&self, predicate: &Predicate<S>) -> Arc<EventChain<S, A>> {
        let find = |entries: &[(Predicate<S>, Arc<EventChain<S, A>>)]| {
            entries
                .iter()
                .find(|(p, _)| p.same(predicate))
                .map(|(_, chain)| chain.clone())
        };
        if let Some(chain) = find(&self.by_predicate.read()) {
            return chain;
        }
        let mut entries = self.by_predicate.write();
        if let Some(chain) = find(&entries) {
            return chain;
        }
        let chain = Arc::new(EventChain::new());
        entries.push((predicate.clone(), chain.clone()));
        chain
    }

    /// Chain for subjects whose tag is in `tags`
    ///
    /// Each call registers a new predicate and therefore a new chain.
    pub fn in_tags<I>(&self, tags: I) -> Arc<EventChain<S, A>>
    where
        I: IntoIterator<Item = S::Tag>,
        S: 'static,
    {
        let tags: FxHashSet<S::Tag> = tags.into_iter().collect();
        let predicate = Predicate::new(move |subject: &S| tags.contains(subject.type_tag()));
        self.matching(&predicate)
    }

    /// Chains relevant to `subject`, in dispatch order
    fn relevant_chains(&self, subject: &S) -> Vec<Arc<EventChain<S, A>>> {
        let mut chains = Vec::new();
        {
            let by_class = self.by_class.read();
            for ancestor in self.hierarchy.ancestors(subject.class()) {
                if let Some(chain) = by_class.get(ancestor) {
                    chains.push(chain.clone());
                }
            }
        }
        if let Some(chain) = self.by_tag.read().get(subject.type_tag()) {
            chains.push(chain.clone());
        }
        let predicates = self.by_predicate.read().clone();
        for (predicate, chain) in predicates {
            if predicate.test(subject) {
                chains.push(chain);
            }
        }
        chains
    }

    /// Run both phases without consulting a memo
    ///
    /// Returns `true` when the occurrence is cancelled.
    pub fn fire(&self, subject: &S, args: &A) -> bool {
        let chains = self.relevant_chains(subject);

        let mut cancelled = false;
        for chain in &chains {
            let verdict = chain.run_before(subject, args);
            if verdict.is_decisive() {
                cancelled = verdict == Verdict::Cancel;
                break;
            }
        }

        for chain in &chains {
            chain.run_after(subject, args, cancelled);
        }

        tracing::trace!(
            handle = subject.handle().0,
            chains = chains.len(),
            cancelled,
            "dispatched occurrence"
        );
        cancelled
    }

    /// Dispatch one occurrence, at most once per instance per period
    ///
    /// If `memo` already holds a decision for the subject it is returned
    /// without running any listener. Returns `true` when cancelled.
    pub fn dispatch(&self, memo: &mut OccurrenceMemo, subject: &S, args: &A) -> bool {
        let handle = subject.handle();
        if let Some(cancelled) = memo.get(handle) {
            return cancelled;
        }
        let cancelled = self.fire(subject, args);
        memo.record(handle, cancelled);
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct Mob {
        handle: u64,
        class: ClassId,
        tag: &'static str,
    }

    impl Subject for Mob {
        type Tag = &'static str;

        fn handle(&self) -> InstanceHandle {
            InstanceHandle(self.handle)
        }

        fn class(&self) -> ClassId {
            self.class
        }

        fn type_tag(&self) -> &Self::Tag {
            &self.tag
        }
    }

    fn hierarchy() -> Arc<ClassHierarchy> {
        Arc::new(
            ClassHierarchy::from_links(
                "Entity",
                vec![("Living", "Entity"), ("Zombie", "Living")],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let events: EventDispatcher<Mob, ()> = EventDispatcher::new(hierarchy());
        let living = events.hierarchy().id("Living").unwrap();

        assert!(Arc::ptr_eq(&events.of_class(living), &events.of_class(living)));
        assert!(Arc::ptr_eq(&events.of_tag("zombie"), &events.of_tag("zombie")));
        assert!(Arc::ptr_eq(&events.all(), &events.of_class_name("Entity").unwrap()));
        assert!(events.of_class_name("Boat").is_none());

        let p = Predicate::new(|m: &Mob| m.handle > 0);
        assert!(Arc::ptr_eq(&events.matching(&p), &events.matching(&p.clone())));
        let q = Predicate::new(|m: &Mob| m.handle > 0);
        assert!(!Arc::ptr_eq(&events.matching(&p), &events.matching(&q)));
    }

    #[test]
    fn test_no_listeners_not_cancelled() {
        let events: EventDispatcher<Mob, ()> = EventDispatcher::new(hierarchy());
        let h = events.hierarchy().id("Zombie").unwrap();
        let mut memo = OccurrenceMemo::new();
        let mob = Mob { handle: 1, class: h, tag: "zombie" };
        assert!(!events.dispatch(&mut memo, &mob, &()));
        assert_eq!(memo.get(InstanceHandle(1)), Some(false));
    }

    #[test]
    fn test_tag_chain_after_class_chains() {
        let events: EventDispatcher<Mob, ()> = EventDispatcher::new(hierarchy());
        let zombie = events.hierarchy().id("Zombie").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        events.of_tag("zombie").register_before(move |_, _| {
            o.lock().push("tag");
            Verdict::Pass
        });
        let o = order.clone();
        events.of_class(zombie).register_before(move |_, _| {
            o.lock().push("class");
            Verdict::Pass
        });

        let mob = Mob { handle: 1, class: zombie, tag: "zombie" };
        assert!(!events.fire(&mob, &()));
        assert_eq!(*order.lock(), vec!["class", "tag"]);
    }

    #[test]
    fn test_in_tags() {
        let events: EventDispatcher<Mob, ()> = EventDispatcher::new(hierarchy());
        let zombie = events.hierarchy().id("Zombie").unwrap();
        events
            .in_tags(["husk", "drowned"])
            .register_before(|_, _| Verdict::Cancel);

        let husk = Mob { handle: 1, class: zombie, tag: "husk" };
        let plain = Mob { handle: 2, class: zombie, tag: "zombie" };
        assert!(events.fire(&husk, &()));
        assert!(!events.fire(&plain, &()));
    }

    #[test]
    fn test_panicking_predicate_does_not_match() {
        let events: EventDispatcher<Mob, ()> = EventDispatcher::new(hierarchy());
        let zombie = events.hierarchy().id("Zombie").unwrap();
        let p = Predicate::new(|_: &Mob| -> bool { panic!("bad predicate") });
        events.matching(&p).register_before(|_, _| Verdict::Cancel);

        let mob = Mob { handle: 1, class: zombie, tag: "zombie" };
        assert!(!events.fire(&mob, &()));
    }
}
