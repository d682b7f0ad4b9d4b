use std::fmt;
use std::rc::Rc;

use crate::compiler::Compiler;
use crate::context::{Context, Methods};
use crate::data::{DataNode, Value};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::reactive::{Binding, ReactiveStore};

/// Construction input: mount selector, root data and methods.
#[derive(Debug, Clone)]
pub struct Options {
    pub el: String,
    pub data: DataNode,
    pub methods: Methods,
}

impl Options {
    pub fn new(el: impl Into<String>, data: DataNode) -> Self {
        Self {
            el: el.into(),
            data,
            methods: Methods::new(),
        }
    }

    /// Root data from a JSON object; nested objects and arrays become nodes
    /// and lists.
    pub fn from_json(el: impl Into<String>, data: serde_json::Value) -> Result<Self> {
        match Value::from(data) {
            Value::Node(data) => Ok(Self::new(el, data)),
            other => Err(Error::type_error("use as root data", other.type_name())),
        }
    }

    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Context, &[Value]) -> Result<Value> + 'static,
    {
        self.methods.insert(name, method);
        self
    }
}

/// A compiled view: the reactive data, the mount point and every live
/// binding between them.
///
/// Dropping the view model drops its bindings, which unsubscribes them from
/// the data. Event listeners stay attached to the platform nodes.
pub struct ViewModel<P: Platform> {
    platform: Rc<P>,
    mount: P::Node,
    store: ReactiveStore,
    context: Context,
    bindings: Vec<Binding>,
}

impl<P: Platform> ViewModel<P> {
    /// Find the mount point, make the data reactive and compile the mount
    /// point's descendants.
    pub fn new(options: Options, platform: Rc<P>) -> Result<Self> {
        let Options { el, data, methods } = options;
        let mount = platform
            .query(&el)
            .ok_or_else(|| Error::MountNotFound(el.clone()))?;
        let store = ReactiveStore::new(data);
        let context = Context::new(store.root().clone(), methods);
        let bindings = Compiler::new(Rc::clone(&platform), context.clone()).compile(&mount)?;
        log::debug!("Mounted '{el}' with {} bindings", bindings.len());
        Ok(Self {
            platform,
            mount,
            store,
            context,
            bindings,
        })
    }

    pub fn data(&self) -> &DataNode {
        self.store.root()
    }

    pub fn store(&self) -> &ReactiveStore {
        &self.store
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn mount(&self) -> &P::Node {
        &self.mount
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }
}

impl<P: Platform> fmt::Debug for ViewModel<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("mount", &self.mount)
            .field("data", self.store.root())
            .field("methods", self.context.methods())
            .field("bindings", &self.bindings)
            .finish()
    }
}
