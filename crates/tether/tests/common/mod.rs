//! Shared page builder for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tether::{Context, MemoryDom, NodeId, Options, Platform, Result, Value, ViewModel};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `<div id="app">` mounted in a fresh [`MemoryDom`].
pub struct Page {
    pub dom: Rc<MemoryDom>,
    pub app: NodeId,
}

impl Page {
    pub fn new() -> Self {
        init_logging();
        let dom = Rc::new(MemoryDom::new());
        let app = dom.element("div");
        dom.set_attribute(app, "id", "app");
        dom.append(dom.body(), app);
        Self { dom, app }
    }

    pub fn element(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let element = self.dom.element(tag);
        for (name, value) in attributes {
            self.dom.set_attribute(element, name, value);
        }
        self.dom.append(parent, element);
        element
    }

    pub fn text(&self, parent: NodeId, content: &str) -> NodeId {
        let text = self.dom.text(content);
        self.dom.append(parent, text);
        text
    }

    pub fn comment(&self, parent: NodeId, content: &str) -> NodeId {
        let comment = self.dom.comment(content);
        self.dom.append(parent, comment);
        comment
    }

    pub fn by_id(&self, id: &str) -> NodeId {
        self.dom
            .query(&format!("#{id}"))
            .unwrap_or_else(|| panic!("no element with id '{id}'"))
    }

    pub fn text_of(&self, node: NodeId) -> String {
        self.dom.text_content(&node)
    }

    pub fn property(&self, node: NodeId, name: &str) -> Value {
        self.dom.property(&node, name)
    }

    pub fn mount(&self, options: Options) -> Result<ViewModel<MemoryDom>> {
        ViewModel::new(options, Rc::clone(&self.dom))
    }
}

/// A method that records the arguments of every call.
pub fn recorder() -> (
    Rc<RefCell<Vec<Vec<Value>>>>,
    impl Fn(&Context, &[Value]) -> Result<Value> + 'static,
) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let method = move |_: &Context, arguments: &[Value]| -> Result<Value> {
        sink.borrow_mut().push(arguments.to_vec());
        Ok(Value::Null)
    };
    (calls, method)
}

/// `name += 1` on the root data.
pub fn increment(name: &'static str) -> impl Fn(&Context, &[Value]) -> Result<Value> + 'static {
    move |context: &Context, _: &[Value]| -> Result<Value> {
        let current = context
            .data()
            .peek(name)
            .and_then(|value| value.to_number())
            .unwrap_or(0.0);
        context.data().set(name, current + 1.0)?;
        Ok(Value::Null)
    }
}
