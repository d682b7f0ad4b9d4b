//! The scope expressions are evaluated in: the root data node plus the
//! method table.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::data::{DataNode, Value};
use crate::error::{Error, Result};

/// A user method. It receives the context it is invoked on and the
/// already-evaluated arguments.
pub type Method = Rc<dyn Fn(&Context, &[Value]) -> Result<Value>>;

#[derive(Clone, Default)]
pub struct Methods {
    table: IndexMap<String, Method>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: Fn(&Context, &[Value]) -> Result<Value> + 'static,
    {
        self.table.insert(name.into(), Rc::new(method));
    }

    pub fn get(&self, name: &str) -> Option<Method> {
        self.table.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Shared evaluation context. Cloning is cheap and aliases the same data.
#[derive(Clone, Debug)]
pub struct Context {
    inner: Rc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    data: DataNode,
    methods: Methods,
}

impl Context {
    pub fn new(data: DataNode, methods: Methods) -> Self {
        Self {
            inner: Rc::new(ContextInner { data, methods }),
        }
    }

    pub fn data(&self) -> &DataNode {
        &self.inner.data
    }

    pub fn methods(&self) -> &Methods {
        &self.inner.methods
    }

    /// Look up `name` in the method table and invoke it with this context.
    ///
    /// The lookup happens on every call, so handlers always see the method
    /// table as it is when they fire.
    pub fn call(&self, name: &str, arguments: &[Value]) -> Result<Value> {
        let method = self
            .inner
            .methods
            .get(name)
            .ok_or_else(|| Error::UnknownMethod(name.to_owned()))?;
        log::trace!("Calling method '{name}' with {} arguments", arguments.len());
        method(self, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_receive_the_context() {
        let mut methods = Methods::new();
        methods.insert("incr", |context: &Context, _: &[Value]| {
            let current = context.data().peek("num").and_then(|v| v.as_number()).unwrap_or(0.0);
            context.data().set("num", current + 1.0)?;
            Ok(Value::Null)
        });
        let context = Context::new(DataNode::new().with("num", 1), methods);
        context.call("incr", &[]).unwrap();
        assert_eq!(context.data().peek("num"), Some(Value::from(2)));
    }

    #[test]
    fn calling_a_missing_method_fails() {
        let context = Context::new(DataNode::new(), Methods::new());
        assert!(matches!(
            context.call("nope", &[]),
            Err(Error::UnknownMethod(name)) if name == "nope"
        ));
    }

    #[test]
    fn method_failures_reach_the_caller() {
        let mut methods = Methods::new();
        methods.insert("fail", |_: &Context, arguments: &[Value]| {
            Err(Error::Method {
                name: "fail".to_owned(),
                message: format!("got {} arguments", arguments.len()),
            })
        });
        let context = Context::new(DataNode::new(), methods);
        assert!(matches!(
            context.call("fail", &[Value::Null]),
            Err(Error::Method { message, .. }) if message == "got 1 arguments"
        ));
    }
}
