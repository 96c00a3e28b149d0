//! Listener chains
//!
//! One [`EventChain`] exists per key (class, tag or predicate). It holds three
//! ordered listener lists. Listeners are snapshotted before they run, so a
//! listener may register more listeners without deadlocking; those take
//! effect from the next occurrence on.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::verdict::Verdict;

type BeforeFn<S, A> = Arc<dyn Fn(&S, &A) -> Verdict + Send + Sync>;
type AfterFn<S, A> = Arc<dyn Fn(&S, &A) + Send + Sync>;

/// Ordered before/after/cancelled listeners for one key
pub struct EventChain<S, A> {
    before: RwLock<Vec<BeforeFn<S, A>>>,
    after: RwLock<Vec<AfterFn<S, A>>>,
    cancelled: RwLock<Vec<AfterFn<S, A>>>,
}

impl<S, A> Default for EventChain<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> std::fmt::Debug for EventChain<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChain")
            .field("before", &self.before.read().len())
            .field("after", &self.after.read().len())
            .field("cancelled", &self.cancelled.read().len())
            .finish()
    }
}

impl<S, A> EventChain<S, A> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            before: RwLock::new(Vec::new()),
            after: RwLock::new(Vec::new()),
            cancelled: RwLock::new(Vec::new()),
        }
    }

    /// Add a listener that may veto the occurrence
    pub fn register_before<F>(&self, listener: F) -> &Self
    where
        F: Fn(&S, &A) -> Verdict + Send + Sync + 'static,
    {
        self.before.write().push(Arc::new(listener));
        self
    }

    /// Add a listener that runs when the occurrence went ahead
    pub fn register_after<F>(&self, listener: F) -> &Self
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        self.after.write().push(Arc::new(listener));
        self
    }

    /// Add a listener that runs when the occurrence was cancelled
    pub fn register_cancelled<F>(&self, listener: F) -> &Self
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        self.cancelled.write().push(Arc::new(listener));
        self
    }

    /// Whether the chain has no listeners at all
    pub fn is_empty(&self) -> bool {
        self.before.read().is_empty() && self.after.read().is_empty() && self.cancelled.read().is_empty()
    }

    /// Run before-listeners in order; the first decisive verdict wins
    ///
    /// A panicking listener is logged and counts as [`Verdict::Pass`].
    pub fn run_before(&self, subject: &S, args: &A) -> Verdict {
        let listeners = self.before.read().clone();
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(subject, args))) {
                Ok(verdict) if verdict.is_decisive() => return verdict,
                Ok(_) => {}
                Err(payload) => {
                    tracing::error!(panic = panic_message(&payload), "before-listener panicked");
                }
            }
        }
        Verdict::Pass
    }

    /// Run the after- or cancelled-listeners
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn run_after(&self, subject: &S, args: &A, cancelled: bool) {
        let listeners = if cancelled {
            self.cancelled.read().clone()
        } else {
            self.after.read().clone()
        };
        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(subject, args))) {
                tracing::error!(
                    panic = panic_message(&payload),
                    cancelled,
                    "after-listener panicked"
                );
            }
        }
    }
}

pub(crate) fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_first_decisive_verdict_wins() {
        let chain: EventChain<u32, ()> = EventChain::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let c = calls.clone();
        chain.register_before(move |_, _| {
            c.lock().push("pass");
            Verdict::Pass
        });
        let c = calls.clone();
        chain.register_before(move |_, _| {
            c.lock().push("allow");
            Verdict::Allow
        });
        let c = calls.clone();
        chain.register_before(move |_, _| {
            c.lock().push("cancel");
            Verdict::Cancel
        });

        assert_eq!(chain.run_before(&1, &()), Verdict::Allow);
        assert_eq!(*calls.lock(), vec!["pass", "allow"]);
    }

    #[test]
    fn test_after_or_cancelled() {
        let chain: EventChain<u32, ()> = EventChain::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let m = log.clone();
        chain
            .register_after(move |s, _| l.lock().push(format!("after {}", s)))
            .register_cancelled(move |s, _| m.lock().push(format!("cancelled {}", s)));

        chain.run_after(&1, &(), false);
        chain.run_after(&2, &(), true);
        assert_eq!(*log.lock(), vec!["after 1", "cancelled 2"]);
    }

    #[test]
    fn test_panicking_listener_is_pass() {
        let chain: EventChain<u32, ()> = EventChain::new();
        chain.register_before(|_, _| panic!("listener bug"));
        chain.register_before(|s, _| Verdict::from_cancel(*s > 10));

        assert_eq!(chain.run_before(&11, &()), Verdict::Cancel);
        assert_eq!(chain.run_before(&3, &()), Verdict::Allow);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let chain: Arc<EventChain<u32, ()>> = Arc::new(EventChain::new());
        let inner = chain.clone();
        chain.register_after(move |_, _| {
            inner.register_after(|_, _| {});
        });

        chain.run_after(&0, &(), false);
        assert!(!chain.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&payload), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&payload), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&payload), "<non-string panic>");
    }
}
