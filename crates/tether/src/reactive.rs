//! Dependency tracking between data fields and bindings.
//!
//! # Architecture
//!
//! ```text
//! Binding::reevaluate
//!   └── tracking::observe()          occupies the thread-local observer slot
//!         └── evaluate(expression)
//!               └── Slot::read()     registers the observer in the field's
//!                                    DependencyRegistry
//!   └── guard.finish()               frees the slot, returns registries read
//!   └── on_update(value)
//!
//! DataNode::set
//!   └── DependencyRegistry::notify_all()
//!         └── Subscriber::notify()   re-evaluates each dependent binding
//! ```
//!
//! # Invariants
//!
//! 1. At most one evaluation occupies the observer slot at any time.
//! 2. A registry never holds the same subscriber twice; re-registration keeps
//!    the original position.
//! 3. Dependents are notified in registration order, synchronously, before
//!    the write returns.
//! 4. After a successful evaluation a binding is registered in exactly the
//!    registries of the fields it read.

pub mod binding;
pub mod registry;
pub mod store;
pub mod tracking;

pub use binding::Binding;
pub use registry::{DependencyRegistry, Subscriber, SubscriberId};
pub use store::ReactiveStore;
