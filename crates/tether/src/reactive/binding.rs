//! Bindings: an expression kept in sync with an update callback.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::registry::{Subscriber, SubscriberId};
use super::tracking::{self, Reads};
use crate::context::Context;
use crate::data::Value;
use crate::error::Result;
use crate::expression::{Expression, evaluate};

pub type UpdateFn = Box<dyn Fn(Value) -> Result<()>>;

/// A live association between an expression and an update callback.
///
/// Construction evaluates the expression once and hands the result to the
/// callback. Afterwards every change of a field read during the last
/// evaluation re-evaluates the expression and calls the callback again.
///
/// Registries only hold bindings weakly; the binding stays live as long as a
/// handle to it exists.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

struct BindingInner {
    id: SubscriberId,
    source: String,
    expression: Expression,
    context: Context,
    on_update: UpdateFn,
    subscriptions: RefCell<Reads>,
    this: Weak<BindingInner>,
}

impl Binding {
    /// Create a binding and run its first evaluation.
    ///
    /// An evaluation error is returned as is; the partially constructed
    /// binding is dropped.
    pub fn new<F>(
        source: impl Into<String>,
        expression: Expression,
        context: Context,
        on_update: F,
    ) -> Result<Self>
    where
        F: Fn(Value) -> Result<()> + 'static,
    {
        let inner = Rc::new_cyclic(|this| BindingInner {
            id: SubscriberId::new(),
            source: source.into(),
            expression,
            context,
            on_update: Box::new(on_update),
            subscriptions: RefCell::new(Reads::new()),
            this: this.clone(),
        });
        log::debug!("Created binding {} for `{}`", inner.id, inner.source);
        let binding = Self { inner };
        binding.reevaluate()?;
        Ok(binding)
    }

    /// Parse `source` and bind it.
    pub fn parse<F>(source: &str, context: Context, on_update: F) -> Result<Self>
    where
        F: Fn(Value) -> Result<()> + 'static,
    {
        let expression = Expression::parse(source)?;
        Self::new(source, expression, context, on_update)
    }

    /// Re-run the expression (re-establishing dependencies) and invoke the
    /// callback with the result.
    pub fn reevaluate(&self) -> Result<()> {
        self.inner.reevaluate()
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn expression(&self) -> &Expression {
        &self.inner.expression
    }

    /// Number of fields the last evaluation depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.inner.id)
            .field("source", &self.inner.source)
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

impl BindingInner {
    fn reevaluate(&self) -> Result<()> {
        let value = self.evaluate()?;
        (self.on_update)(value)
    }

    fn evaluate(&self) -> Result<Value> {
        let subscriber: Weak<dyn Subscriber> = self.this.clone();
        let guard = tracking::observe(self.id, subscriber)?;
        let result = evaluate(&self.expression, &self.context);
        let reads = guard.finish();
        self.resubscribe(reads, result.is_ok());
        result
    }

    /// Reconcile registry memberships with the registries just read.
    ///
    /// After a failed evaluation the old memberships are kept alongside the
    /// new ones, so fixing any field involved re-triggers the binding.
    fn resubscribe(&self, reads: Reads, succeeded: bool) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if succeeded {
            for stale in subscriptions
                .iter()
                .filter(|old| !reads.iter().any(|read| Rc::ptr_eq(read, old)))
            {
                stale.unregister(&self.id);
            }
            *subscriptions = reads;
        } else {
            for read in reads {
                if !subscriptions.iter().any(|old| Rc::ptr_eq(old, &read)) {
                    subscriptions.push(read);
                }
            }
        }
    }
}

impl Subscriber for BindingInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify(&self) -> Result<()> {
        self.reevaluate()
    }
}

impl Drop for BindingInner {
    fn drop(&mut self) {
        for registry in self.subscriptions.get_mut().drain(..) {
            registry.unregister(&self.id);
        }
    }
}
