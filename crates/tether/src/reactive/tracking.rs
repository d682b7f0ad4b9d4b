//! The active observer slot.
//!
//! Field reads only become dependencies while an evaluation holds the slot.
//! The slot is thread-local: bindings are `!Send`, so every binding and every
//! field it reads live on the thread that evaluates them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::registry::{DependencyRegistry, Subscriber, SubscriberId};
use crate::error::{Error, Result};

pub(crate) type Reads = SmallVec<[Rc<DependencyRegistry>; 4]>;

struct Observer {
    id: SubscriberId,
    subscriber: Weak<dyn Subscriber>,
    reads: Reads,
}

thread_local! {
    static ACTIVE_OBSERVER: RefCell<Option<Observer>> = const { RefCell::new(None) };
}

/// Occupies the observer slot until finished or dropped.
#[must_use = "dropping the guard ends dependency tracking immediately"]
pub(crate) struct ObserverGuard {
    _private: (),
}

impl ObserverGuard {
    /// Free the slot and return the registries read during the evaluation.
    pub(crate) fn finish(self) -> Reads {
        ACTIVE_OBSERVER
            .with(|slot| slot.borrow_mut().take())
            .map(|observer| observer.reads)
            .unwrap_or_default()
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let _ = ACTIVE_OBSERVER.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Start attributing field reads to `subscriber`.
pub(crate) fn observe(id: SubscriberId, subscriber: Weak<dyn Subscriber>) -> Result<ObserverGuard> {
    ACTIVE_OBSERVER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::NestedEvaluation);
        }
        *slot = Some(Observer {
            id,
            subscriber,
            reads: SmallVec::new(),
        });
        Ok(ObserverGuard { _private: () })
    })
}

/// Register the active observer (if any) in `registry`.
pub(crate) fn track(registry: &Rc<DependencyRegistry>) {
    ACTIVE_OBSERVER.with(|slot| {
        let mut slot = slot.borrow_mut();
        let Some(observer) = slot.as_mut() else {
            return;
        };
        if observer.reads.iter().any(|read| Rc::ptr_eq(read, registry)) {
            return;
        }
        registry.register(observer.id, observer.subscriber.clone());
        observer.reads.push(Rc::clone(registry));
        log::trace!("Subscriber {} now depends on {} fields", observer.id, observer.reads.len());
    });
}

/// Run `f` with the observer slot temporarily vacated, so its reads register
/// nothing. The suspended observer is restored afterwards.
pub(crate) fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let suspended = ACTIVE_OBSERVER.with(|slot| slot.borrow_mut().take());
    let result = f();
    if let Some(observer) = suspended {
        ACTIVE_OBSERVER.with(|slot| *slot.borrow_mut() = Some(observer));
    }
    result
}

/// Whether an evaluation currently holds the observer slot.
pub fn is_tracking() -> bool {
    ACTIVE_OBSERVER.with(|slot| slot.borrow().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle(SubscriberId);

    impl Subscriber for Idle {
        fn id(&self) -> SubscriberId {
            self.0
        }

        fn notify(&self) -> Result<()> {
            Ok(())
        }
    }

    fn idle() -> (Rc<Idle>, Weak<dyn Subscriber>) {
        let idle = Rc::new(Idle(SubscriberId::new()));
        let weak = Rc::downgrade(&idle);
        let weak: Weak<dyn Subscriber> = weak;
        (idle, weak)
    }

    #[test]
    fn reads_outside_an_evaluation_are_ignored() {
        let registry = Rc::new(DependencyRegistry::new());
        track(&registry);
        assert!(registry.is_empty());
        assert!(!is_tracking());
    }

    #[test]
    fn repeated_reads_register_once() {
        let (observer, weak) = idle();
        let registry = Rc::new(DependencyRegistry::new());
        let guard = observe(observer.id(), weak).unwrap();
        track(&registry);
        track(&registry);
        let reads = guard.finish();
        assert_eq!(reads.len(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!is_tracking());
    }

    #[test]
    fn untracked_reads_do_not_register() {
        let (observer, weak) = idle();
        let registry = Rc::new(DependencyRegistry::new());
        let guard = observe(observer.id(), weak).unwrap();
        untracked(|| track(&registry));
        assert!(is_tracking());
        let reads = guard.finish();
        assert!(reads.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn nested_observation_is_rejected() {
        let (first, first_weak) = idle();
        let (second, second_weak) = idle();
        let guard = observe(first.id(), first_weak).unwrap();
        assert!(matches!(
            observe(second.id(), second_weak),
            Err(Error::NestedEvaluation)
        ));
        drop(guard);
        assert!(!is_tracking());
    }
}
