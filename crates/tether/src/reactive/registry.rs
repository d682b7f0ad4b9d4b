//! Per-field sets of dependents.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use indexmap::IndexMap;
use smallvec::SmallVec;
use ulid::Ulid;

use crate::error::Result;

/// Unique identity of a subscriber within every registry it joins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Ulid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something that re-runs when a field it depends on changes.
pub trait Subscriber {
    fn id(&self) -> SubscriberId;

    fn notify(&self) -> Result<()>;
}

/// The dependents of one reactive field.
///
/// Subscribers are held weakly and kept in registration order. Dropped
/// subscribers are pruned lazily during notification.
#[derive(Default)]
pub struct DependencyRegistry {
    subscribers: RefCell<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` (and keeps the original position) when
    /// it is already registered.
    pub fn register(&self, id: SubscriberId, subscriber: Weak<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        true
    }

    pub fn unregister(&self, id: &SubscriberId) -> bool {
        self.subscribers.borrow_mut().shift_remove(id).is_some()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Notify every subscriber in registration order.
    ///
    /// Works on a snapshot so subscribers may re-register (or leave) while
    /// being notified; one that left the registry before its turn is skipped.
    /// The first error aborts the pass.
    pub fn notify_all(&self) -> Result<()> {
        let snapshot: SmallVec<[(SubscriberId, Weak<dyn Subscriber>); 8]> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(id, subscriber)| (*id, subscriber.clone()))
            .collect();

        for (id, subscriber) in snapshot {
            if !self.contains(&id) {
                continue;
            }
            match subscriber.upgrade() {
                Some(subscriber) => {
                    log::trace!("Notifying subscriber {id}");
                    subscriber.notify()?;
                }
                None => {
                    self.unregister(&id);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        id: SubscriberId,
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl Subscriber for Recorder {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn notify(&self) -> Result<()> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                return Err(Error::UnknownIdentifier(self.name.to_owned()));
            }
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        log: &Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    ) -> Rc<Recorder> {
        Rc::new(Recorder {
            id: SubscriberId::new(),
            name,
            log: log.clone(),
            fail,
        })
    }

    fn register(registry: &DependencyRegistry, subscriber: &Rc<Recorder>) -> bool {
        let weak = Rc::downgrade(subscriber);
        let weak: Weak<dyn Subscriber> = weak;
        registry.register(subscriber.id, weak)
    }

    #[test]
    fn registration_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = DependencyRegistry::new();
        let a = recorder("a", &log, false);
        assert!(register(&registry, &a));
        assert!(!register(&registry, &a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn notifies_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = DependencyRegistry::new();
        let a = recorder("a", &log, false);
        let b = recorder("b", &log, false);
        register(&registry, &b);
        register(&registry, &a);
        register(&registry, &b);
        registry.notify_all().unwrap();
        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn failure_aborts_the_remaining_notifications() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = DependencyRegistry::new();
        let a = recorder("a", &log, false);
        let bad = recorder("bad", &log, true);
        let c = recorder("c", &log, false);
        for subscriber in [&a, &bad, &c] {
            register(&registry, subscriber);
        }
        assert!(registry.notify_all().is_err());
        assert_eq!(*log.borrow(), vec!["a", "bad"]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = DependencyRegistry::new();
        let a = recorder("a", &log, false);
        register(&registry, &a);
        drop(a);
        registry.notify_all().unwrap();
        assert!(registry.is_empty());
        assert!(log.borrow().is_empty());
    }
}
